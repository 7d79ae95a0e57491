//! Recipe–plant join.
//!
//! Recipes are grouped by trimmed `recipe_name`; every recipe row contributes
//! one plant reference, resolved against an index of plants keyed by trimmed
//! `ewe_name`. Scalar recipe fields come from the first row of each group.
//!
//! Field precedence for a resolved reference:
//!
//! | field            | source                                              |
//! |------------------|-----------------------------------------------------|
//! | `X`, `Y`         | plant row, coerced to numbers                       |
//! | `ewe_name`       | plant row as written (untrimmed)                    |
//! | `part`           | plant row when it has the column, else reference    |
//! | `details`        | plant row, with `X`/`Y` coerced                     |
//! | any other column | plant row, flattened onto the top level             |
//!
//! An unresolved reference keeps its own `ewe_name` and `part`.

use serde::Serialize;
use std::collections::HashMap;

use crate::row::{Numeric, Row, X_COLUMN, Y_COLUMN};

pub const RECIPE_NAME: &str = "recipe_name";
pub const EN_RECIPE_NAME: &str = "EN_recipe_name";
pub const CLASS_FATUMBI: &str = "class_fatumbi";
pub const ODU: &str = "odu";
pub const RECIPE: &str = "recipe";
pub const RECIPE_EN: &str = "recipe_EN";
pub const PLANT_NAME: &str = "ewe_name";
pub const PART: &str = "part";
pub const DETAILS: &str = "details";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantRef {
  pub ewe_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub part: Option<String>,
}

/// Indexed plant fields attached to a resolved reference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantDetails {
  #[serde(rename = "X")]
  pub x: Option<Numeric>,
  #[serde(rename = "Y")]
  pub y: Option<Numeric>,
  #[serde(flatten)]
  pub fields: Row,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantDetail {
  pub ewe_name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub part: Option<String>,
  #[serde(rename = "X")]
  pub x: Option<Numeric>,
  #[serde(rename = "Y")]
  pub y: Option<Numeric>,
  pub details: Option<PlantDetails>,
  /// Remaining plant columns, exposed at the top level
  #[serde(flatten)]
  pub extra: Row,
}

impl PlantDetail {
  fn missing(reference: &PlantRef) -> Self {
    Self {
      ewe_name: reference.ewe_name.clone(),
      part: reference.part.clone(),
      x: None,
      y: None,
      details: None,
      extra: Row::new(),
    }
  }

  fn resolved(reference: &PlantRef, plant: &Row) -> Self {
    let x = plant.get(X_COLUMN).map(|value| value.to_numeric());
    let y = plant.get(Y_COLUMN).map(|value| value.to_numeric());

    let rest: Row = plant
      .iter()
      .filter(|(column, _)| column.as_str() != X_COLUMN && column.as_str() != Y_COLUMN)
      .map(|(column, value)| (column.clone(), value.clone()))
      .collect();

    let extra: Row = rest
      .iter()
      .filter(|(column, _)| !matches!(column.as_str(), PLANT_NAME | PART | DETAILS))
      .map(|(column, value)| (column.clone(), value.clone()))
      .collect();

    let ewe_name = plant.text(PLANT_NAME).unwrap_or(reference.ewe_name.as_str()).to_string();
    let part = if plant.contains(PART) {
      plant.text(PART).map(str::to_string)
    } else {
      reference.part.clone()
    };

    Self {
      ewe_name,
      part,
      x,
      y,
      details: Some(PlantDetails { x, y, fields: rest }),
      extra,
    }
  }

  pub fn is_resolved(&self) -> bool {
    self.details.is_some()
  }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedRecipe {
  pub recipe_name: String,
  #[serde(rename = "EN_recipe_name", skip_serializing_if = "Option::is_none")]
  pub en_recipe_name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub class_fatumbi: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub odu: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub recipe: Option<String>,
  #[serde(rename = "recipe_EN", skip_serializing_if = "Option::is_none")]
  pub recipe_en: Option<String>,
  pub plants: Vec<PlantRef>,
  #[serde(rename = "plantDetails")]
  pub plant_details: Vec<PlantDetail>,
}

impl MergedRecipe {
  fn from_first_row(row: &Row) -> Self {
    let text = |column: &str| row.text(column).map(str::to_string);
    Self {
      recipe_name: text(RECIPE_NAME).unwrap_or_default(),
      en_recipe_name: text(EN_RECIPE_NAME),
      class_fatumbi: text(CLASS_FATUMBI),
      odu: text(ODU),
      recipe: text(RECIPE),
      recipe_en: text(RECIPE_EN),
      plants: Vec::new(),
      plant_details: Vec::new(),
    }
  }
}

/// Plants keyed by trimmed `ewe_name`, last row wins
pub struct PlantIndex<'a> {
  plants: HashMap<&'a str, &'a Row>,
}

impl<'a> PlantIndex<'a> {
  pub fn build(plant_rows: &'a [Row]) -> Self {
    let mut plants = HashMap::new();
    for row in plant_rows {
      if let Some(name) = row.trimmed(PLANT_NAME) {
        plants.insert(name, row);
      }
    }
    Self { plants }
  }

  pub fn get(&self, name: &str) -> Option<&'a Row> {
    self.plants.get(name).copied()
  }

  pub fn len(&self) -> usize {
    self.plants.len()
  }

  pub fn is_empty(&self) -> bool {
    self.plants.is_empty()
  }
}

/// Group recipe rows and attach plant details
pub fn merge_recipes(recipe_rows: &[Row], plant_rows: &[Row]) -> Vec<MergedRecipe> {
  let index = PlantIndex::build(plant_rows);

  let mut recipes: Vec<MergedRecipe> = Vec::new();
  let mut positions: HashMap<&str, usize> = HashMap::new();

  for row in recipe_rows {
    let Some(key) = row.trimmed(RECIPE_NAME) else {
      continue;
    };

    let position = *positions.entry(key).or_insert_with(|| {
      recipes.push(MergedRecipe::from_first_row(row));
      recipes.len() - 1
    });

    recipes[position].plants.push(PlantRef {
      ewe_name: row.text(PLANT_NAME).map(str::trim).unwrap_or_default().to_string(),
      part: row.text(PART).map(str::to_string),
    });
  }

  for recipe in &mut recipes {
    recipe.plant_details = recipe
      .plants
      .iter()
      .map(|reference| match index.get(&reference.ewe_name) {
        Some(plant) if !reference.ewe_name.is_empty() => PlantDetail::resolved(reference, plant),
        _ => PlantDetail::missing(reference),
      })
      .collect();
  }

  recipes
}
