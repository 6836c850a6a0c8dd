//! Prompt file handling and the seeded prompt-set expander
//!
//! `prompt.json` holds `{"prompts": [{"name": ..., "text": ...}], ...}`.
//! Keys the tool does not know about, at either level, survive a rewrite.

use std::collections::HashSet;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{Error, Result};

pub const DEFAULT_TARGET_TOTAL: usize = 500;
pub const DEFAULT_SEED: u64 = 42;

/// One named prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptEntry {
    #[serde(default)]
    pub name: String,
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PromptEntry {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            extra: Map::new(),
        }
    }
}

/// The whole prompt file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptFile {
    #[serde(default)]
    pub prompts: Vec<PromptEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PromptFile {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::PromptFileMissing(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path).map_err(common::Error::from)?;
        serde_json::from_str(&raw).map_err(|e| Error::PromptFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Write back as pretty-printed JSON, non-ASCII left as is.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut raw = serde_json::to_string_pretty(self).map_err(common::Error::from)?;
        raw.push('\n');
        std::fs::write(path, raw).map_err(common::Error::from)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }
}

/// Lowercase slug of `[a-z0-9_-]`; anything else becomes a single `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        let c = if c.is_ascii_alphanumeric() || c == '-' {
            c.to_ascii_lowercase()
        } else {
            '_'
        };
        if c == '_' && slug.ends_with('_') {
            continue;
        }
        slug.push(c);
    }
    slug.trim_matches('_').to_string()
}

/// `base`, or `base_2`, `base_3`, ... whichever is first free.
pub fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Scene categories and their motifs, visited round-robin.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "outdoor_landscapes",
        &[
            "alpine_lake_shore",
            "misty_pine_forest",
            "desert_dune_ridge",
            "lavender_field_dawn",
            "rice_terrace_overlook",
            "tropical_lagoon_boardwalk",
            "cliff_edge_ocean_spray",
            "mangrove_shallows",
            "snowfield_blue_hour",
            "countryside_orchard_blossom",
        ],
    ),
    (
        "studio_materials",
        &[
            "polished_concrete_pedestal",
            "brushed_metal_plane",
            "sandstone_arch_forms",
            "translucent_acrylic_blocks",
            "frosted_glass_wall",
            "satin_fabric_drape",
            "raw_wooden_plinth",
            "ceramic_tile_grid",
            "soft_felt_stage",
            "matte_cardstock_layers",
        ],
    ),
    (
        "architecture_spaces",
        &[
            "minimal_gallery_niche",
            "sunlit_atrium_stairs",
            "arcade_columns_shadow",
            "skylight_beam_room",
            "brutalist_corner_light",
            "courtyard_reflecting_pool",
            "modernist_balcony",
            "arched_window_bay",
            "terracotta_loggia",
            "tea_house_engawa",
        ],
    ),
    (
        "motion_energy",
        &[
            "silk_ribbon_swoop",
            "powder_burst_pastel",
            "water_arc_crown",
            "petal_swirl_vortex",
            "mist_stream_backlit",
            "lensflare_sweep",
            "sparkle_dust_trail",
            "bokeh_light_rain",
            "paper_confetti_float",
            "shadow_pan_parallax",
        ],
    ),
    (
        "macro_textures",
        &[
            "dew_kissed_leaf",
            "rose_petals_close",
            "citrus_peel_macro",
            "eucalyptus_vein_detail",
            "marble_vein_close",
            "soap泡_microfoam",
            "mica_glitter_sheen",
            "linen_weave_soft",
            "honeycomb_glow",
            "ice_crystal_lattice",
        ],
    ),
    (
        "seasons_times",
        &[
            "spring_blossom_breeze",
            "summer_noon_glare",
            "autumn_warm_foliage",
            "winter_crisp_light",
            "golden_hour_glow",
            "blue_hour_serenity",
            "overcast_softbox",
            "sunrise_hazy_aura",
            "twilight_ambience",
            "night_candlelit",
        ],
    ),
    (
        "editorial_graphic",
        &[
            "gridline_modern_layout",
            "negative_space_balanced",
            "color_block_triad",
            "diagonal_split_stage",
            "shadow_gobo_palm",
            "halftone_overlay_subtle",
            "prism_rainbow_trim",
            "paper_cut_collage",
            "foil_stamp_hint",
            "type_field_placeholder",
        ],
    ),
    (
        "retail_display",
        &[
            "window_boutique_glow",
            "endcap_symmetric",
            "island_table_arrangement",
            "lightbox_glass_reflection",
            "podium_tiered_steps",
            "pedestal_ring_light",
            "backlit_shelf_array",
            "rotating_turntable",
            "poster_wall_backdrop",
            "floor_decal_focus",
        ],
    ),
];

const INTROS: &[&str] = &[
    "Product-only hero shot:",
    "Premium campaign visual:",
    "Flagship advertisement look:",
    "High-end cosmetic showcase:",
    "Editorial beauty hero:",
];

const FOREGROUNDS: &[&str] = &[
    "Place the pink skincare bottle upright with label perfectly sharp",
    "Set the pink pump bottle slightly angled, label clean and legible",
    "Center the pink bottle, pump facing forward with pristine label",
    "Position the product hero with elegant stance and crisp label",
];

const LIGHTING: &[&str] = &[
    "soft directional key and gentle fill",
    "balanced softbox lighting with subtle rim",
    "natural window-style light with refined highlights",
    "low-key cinematic contrast and controlled speculars",
    "bright airy exposure with clean shadows",
];

const BACKDROPS: &[&str] = &[
    "clean gradient backdrop",
    "soft off-white seamless",
    "muted pastel environment",
    "charcoal-to-ink vignette",
    "sunlit ambience with tasteful bokeh",
];

const EXTRAS: &[&str] = &[
    "razor detail and premium color accuracy",
    "magazine-ready composition and true-to-color finish",
    "luxury brand language with immaculate edges",
    "campaign-grade sharpness and elegant negative space",
    "refined reflections and subtle texture cues",
];

fn pick<'a>(rng: &mut StdRng, options: &[&'a str]) -> &'a str {
    options[rng.random_range(0..options.len())]
}

fn scene_text(rng: &mut StdRng, category: &str, motif: &str) -> String {
    let intro = pick(rng, INTROS);
    let foreground = pick(rng, FOREGROUNDS);
    let light = pick(rng, LIGHTING);
    let backdrop = pick(rng, BACKDROPS);
    let extra = pick(rng, EXTRAS);
    format!(
        "{intro} {foreground}. Scene theme: {} — {}. Use {light}, {backdrop}, {extra}. \
         Maintain a clean, modern luxury cosmetic aesthetic; the product remains the clear focal point.",
        category.replace('_', " "),
        motif.replace('_', " "),
    )
}

/// Append generated prompts until the file holds `target_total` entries.
///
/// Returns how many were added. Same seed and starting file, same result.
pub fn expand(file: &mut PromptFile, target_total: usize, seed: u64) -> usize {
    let to_add = target_total.saturating_sub(file.len());
    if to_add == 0 {
        return 0;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut taken: HashSet<String> = file.prompts.iter().map(|p| p.name.clone()).collect();

    for idx in 0..to_add {
        let (category, motifs) = CATEGORIES[idx % CATEGORIES.len()];
        let motif = motifs[(idx / CATEGORIES.len()) % motifs.len()];
        let name = unique_name(
            &slugify(&format!("ultra_{category}_{motif}_{idx:02}")),
            &taken,
        );
        let text = scene_text(&mut rng, category, motif);
        taken.insert(name.clone());
        file.prompts.push(PromptEntry::new(name, text));
    }
    to_add
}

/// `expand-prompts` subcommand: load, expand, write back.
pub fn run_expand(path: &Path, target_total: usize, seed: u64) -> Result<usize> {
    let mut file = PromptFile::load(path)?;
    let current = file.len();
    let added = expand(&mut file, target_total, seed);
    if added == 0 {
        info!(current, target_total, "already at target, no prompts added");
        return Ok(0);
    }
    file.save(path)?;
    info!(added, total = file.len(), path = %path.display(), "prompt file expanded");
    Ok(added)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn write(dir: &tempfile::TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("prompt.json");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn slugify_collapses_and_lowercases() {
        assert_eq!(slugify("Ultra Hero  Shot!!"), "ultra_hero_shot");
        assert_eq!(slugify("__a--B__"), "a--b");
        assert_eq!(slugify("soap泡_microfoam"), "soap_microfoam");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn unique_name_appends_counter() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("hero", &taken), "hero");
        taken.insert("hero".to_string());
        assert_eq!(unique_name("hero", &taken), "hero_2");
        taken.insert("hero_2".to_string());
        assert_eq!(unique_name("hero", &taken), "hero_3");
    }

    #[test]
    fn expand_round_robins_categories_then_motifs() {
        let mut file = PromptFile::default();
        let added = expand(&mut file, 10, DEFAULT_SEED);
        assert_eq!(added, 10);

        let names: Vec<&str> = file.prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names[0], "ultra_outdoor_landscapes_alpine_lake_shore_00");
        assert_eq!(names[1], "ultra_studio_materials_polished_concrete_pedestal_01");
        assert_eq!(names[7], "ultra_retail_display_window_boutique_glow_07");
        assert_eq!(names[8], "ultra_outdoor_landscapes_misty_pine_forest_08");
        assert!(
            file.prompts[0]
                .text
                .contains("Scene theme: outdoor landscapes — alpine lake shore.")
        );
    }

    #[test]
    fn non_ascii_motif_is_slugged_in_name_but_kept_in_text() {
        let mut file = PromptFile::default();
        // macro_textures is category 4; its sixth motif comes up at 4 + 8 * 5
        expand(&mut file, 45, DEFAULT_SEED);
        let entry = &file.prompts[44];
        assert_eq!(entry.name, "ultra_macro_textures_soap_microfoam_44");
        assert!(
            entry
                .text
                .contains("Scene theme: macro textures — soap泡 microfoam."),
            "got: {}",
            entry.text
        );
    }

    #[test]
    fn expand_is_deterministic_per_seed() {
        let mut a = PromptFile::default();
        let mut b = PromptFile::default();
        expand(&mut a, 40, 7);
        expand(&mut b, 40, 7);
        assert_eq!(a, b);

        let mut c = PromptFile::default();
        expand(&mut c, 40, 8);
        let same_names = a
            .prompts
            .iter()
            .zip(&c.prompts)
            .all(|(x, y)| x.name == y.name);
        assert!(same_names, "names depend only on position");
    }

    #[test]
    fn expand_avoids_existing_names() {
        let mut file = PromptFile {
            prompts: vec![PromptEntry::new(
                "ultra_outdoor_landscapes_alpine_lake_shore_00",
                "hand written",
            )],
            extra: Map::new(),
        };
        expand(&mut file, 2, DEFAULT_SEED);
        assert_eq!(
            file.prompts[1].name,
            "ultra_outdoor_landscapes_alpine_lake_shore_00_2"
        );
    }

    #[test]
    fn expand_at_or_above_target_is_noop() {
        let mut file = PromptFile::default();
        expand(&mut file, 5, DEFAULT_SEED);
        let before = file.clone();
        assert_eq!(expand(&mut file, 5, DEFAULT_SEED), 0);
        assert_eq!(expand(&mut file, 3, DEFAULT_SEED), 0);
        assert_eq!(file, before);
    }

    #[test]
    fn run_expand_preserves_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            r#"{"version": 2, "prompts": [{"name": "a", "text": "t", "aspect": "1:1"}]}"#,
        );

        let added = run_expand(&path, 3, DEFAULT_SEED).unwrap();
        assert_eq!(added, 2);

        let reloaded = PromptFile::load(&path).unwrap();
        assert_eq!(reloaded.len(), 3);
        assert_eq!(reloaded.extra.get("version"), Some(&Value::from(2)));
        assert_eq!(
            reloaded.prompts[0].extra.get("aspect"),
            Some(&Value::from("1:1"))
        );
    }

    #[test]
    fn run_expand_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_expand(&dir.path().join("absent.json"), 10, DEFAULT_SEED).unwrap_err();
        assert!(matches!(err, Error::PromptFileMissing(_)));
    }

    #[test]
    fn load_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "{\"prompts\": [");
        assert!(matches!(
            PromptFile::load(&path).unwrap_err(),
            Error::PromptFile { .. }
        ));
    }
}
