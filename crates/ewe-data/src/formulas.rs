//! Formula export: each recipe reduced to the botanical names it uses.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::warn;

use crate::merge::{PLANT_NAME, RECIPE_NAME};
use crate::row::Row;

pub const BOTANICAL_NAME: &str = "botanical_name";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
  pub name: String,
  pub plants: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormulaReport {
  /// Sorted by formula name
  pub formulas: Vec<Formula>,
  /// Plant names referenced by recipes with no botanical mapping
  pub unmapped: Vec<String>,
}

fn normalize_plant(name: &str) -> String {
  name.trim().to_lowercase()
}

/// Group recipes by trimmed name and map their plants to botanical names.
///
/// Plant names match case-insensitively. Botanical names within a formula
/// are deduplicated and sorted.
pub fn build_formulas(recipe_rows: &[Row], plant_rows: &[Row]) -> FormulaReport {
  let botanical: HashMap<String, String> = plant_rows
    .iter()
    .filter_map(|row| {
      let name = row.text(PLANT_NAME)?;
      let botanical = row.trimmed(BOTANICAL_NAME)?;
      Some((normalize_plant(name), botanical.to_string()))
    })
    .collect();

  let mut grouped: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
  let mut unmapped: BTreeSet<String> = BTreeSet::new();

  for row in recipe_rows {
    let Some(recipe) = row.trimmed(RECIPE_NAME) else {
      continue;
    };
    let plants = grouped.entry(recipe.to_string()).or_default();

    let plant = normalize_plant(row.text(PLANT_NAME).unwrap_or_default());
    match botanical.get(&plant) {
      Some(name) => {
        plants.insert(name.clone());
      }
      None => {
        if unmapped.insert(plant.clone()) {
          warn!("Missing plant mapping for: {}", plant);
        }
      }
    }
  }

  let formulas = grouped
    .into_iter()
    .map(|(name, plants)| Formula { name, plants: plants.into_iter().collect() })
    .collect();

  FormulaReport { formulas, unmapped: unmapped.into_iter().collect() }
}
