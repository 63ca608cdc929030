//! Board layer names accepted by `pcbnew_do export`.

use crate::error::{KiAutoError, KiAutoResult};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Non-copper layers with their KiCad 5 layer ids.
const TECHNICAL_LAYERS: &[(&str, u32)] = &[
    ("B.Adhes", 32),
    ("F.Adhes", 33),
    ("B.Paste", 34),
    ("F.Paste", 35),
    ("B.SilkS", 36),
    ("F.SilkS", 37),
    ("B.Mask", 38),
    ("F.Mask", 39),
    ("Dwgs.User", 40),
    ("Cmts.User", 41),
    ("Eco1.User", 42),
    ("Eco2.User", 43),
    ("Edge.Cuts", 44),
    ("Margin", 45),
    ("B.CrtYd", 46),
    ("F.CrtYd", 47),
    ("B.Fab", 48),
    ("F.Fab", 49),
];

/// Inner copper layers run from `In1.Cu` (id 1) to `In30.Cu` (id 30).
const INNER_COPPER_LAYERS: u32 = 30;
const BACK_COPPER_ID: u32 = 31;

fn layer_decl_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // (31 B.Cu signal) or (1 In1.Cu signal "GND_Plane")
        #[allow(clippy::unwrap_used)]
        Regex::new(r#"^\s*\((\d+)\s+("[^"]+"|\S+)\s+\w+(?:\s+"([^"]+)")?\s*\)"#).unwrap()
    })
}

/// Layer names that are valid for a board, with their ids.
#[derive(Clone, Debug, Default)]
pub struct LayerTable {
    ids: BTreeMap<String, u32>,
}

impl LayerTable {
    /// Every standard KiCad layer name.
    pub fn standard() -> Self {
        let mut ids: BTreeMap<String, u32> = TECHNICAL_LAYERS
            .iter()
            .map(|(name, id)| ((*name).to_string(), *id))
            .collect();
        ids.insert("F.Cu".to_string(), 0);
        ids.insert("B.Cu".to_string(), BACK_COPPER_ID);
        for i in 1..=INNER_COPPER_LAYERS {
            ids.insert(format!("In{i}.Cu"), i);
        }
        Self { ids }
    }

    /// Standard names plus the user names declared in the board's
    /// `(layers ...)` block.
    pub fn for_board(contents: &str) -> Self {
        let mut table = Self::standard();
        let mut in_layers = false;
        for line in contents.lines() {
            let trimmed = line.trim();
            if !in_layers {
                in_layers = trimmed.starts_with("(layers");
                continue;
            }
            if trimmed == ")" {
                break;
            }
            let Some(caps) = layer_decl_regex().captures(line) else {
                continue;
            };
            let Some(id) = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) else {
                continue;
            };
            if let Some(name) = caps.get(2) {
                table
                    .ids
                    .insert(name.as_str().trim_matches('"').to_string(), id);
            }
            if let Some(user) = caps.get(3) {
                table.ids.insert(user.as_str().to_string(), id);
            }
        }
        table
    }

    /// Id of the layer called `name`, if any.
    pub fn id(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Resolve every requested layer to its id, failing on the first
    /// unknown name.
    pub fn resolve<'a>(&self, requested: impl IntoIterator<Item = &'a str>) -> KiAutoResult<Vec<u32>> {
        requested
            .into_iter()
            .map(|layer| {
                self.id(layer)
                    .ok_or_else(|| KiAutoError::UnknownLayer(layer.to_string()))
            })
            .collect()
    }
}
