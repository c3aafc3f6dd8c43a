//! Project loading, saving, validation, and introspection.

use std::collections::BTreeMap;
use std::path::Path;

use lf_fuzzy::ValveMap;
use lf_project::schema::{PlantDef, Project, ValveDef};
use lf_project::LATEST_VERSION;
use tracing::info;

use crate::error::AppResult;

/// Short description of a project for display.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectSummary {
    pub name: String,
    pub version: u32,
    pub valves: Vec<String>,
    /// True when membership and rules are stored explicitly.
    pub explicit_fuzzy: bool,
    /// True when persisted gain multipliers will be restored.
    pub adapted: bool,
    pub has_plant: bool,
}

/// Load a project (YAML or JSON by extension), migrated and validated.
pub fn load_project(path: &Path) -> AppResult<Project> {
    let project = lf_project::load(path)?;
    info!(path = %path.display(), name = %project.name, "project loaded");
    Ok(project)
}

/// Save a project (YAML or JSON by extension) after validating it.
pub fn save_project(path: &Path, project: &Project) -> AppResult<()> {
    lf_project::save(path, project)?;
    info!(path = %path.display(), "project saved");
    Ok(())
}

pub fn validate_project(project: &Project) -> AppResult<()> {
    lf_project::validate_project(project)?;
    Ok(())
}

/// Convert a legacy controller settings file into a project.
pub fn import_legacy(path: &Path) -> AppResult<Project> {
    let project = lf_project::import_legacy_json(path)?;
    info!(path = %path.display(), name = %project.name, "legacy settings imported");
    Ok(project)
}

/// Starter project: one fill and one drain valve (0–10), default tuning,
/// default adaptation and a small simulated tank.
pub fn default_project(name: impl Into<String>) -> Project {
    Project {
        version: LATEST_VERSION,
        name: name.into(),
        valves: vec![
            ValveDef {
                name: "fill".to_string(),
                min_out: 0.0,
                max_out: 10.0,
            },
            ValveDef {
                name: "drain".to_string(),
                min_out: 0.0,
                max_out: 10.0,
            },
        ],
        tuning: Default::default(),
        fuzzy: None,
        adaptation: Default::default(),
        timing: Default::default(),
        gain_multipliers: BTreeMap::new(),
        plant: Some(PlantDef::default()),
    }
}

/// Write learned gains back into `project`.
///
/// A map of unit gains carries no adaptation and is stored as empty, so a
/// reload does not mark the controller adapted.
pub fn store_gains(project: &mut Project, gains: &ValveMap) {
    if gains.values().all(|g| *g == 1.0) {
        project.gain_multipliers.clear();
    } else {
        project.gain_multipliers = gains.clone();
    }
}

pub fn summarize(project: &Project) -> ProjectSummary {
    ProjectSummary {
        name: project.name.clone(),
        version: project.version,
        valves: project.valves.iter().map(|v| v.name.clone()).collect(),
        explicit_fuzzy: project.fuzzy.is_some(),
        adapted: !project.gain_multipliers.is_empty(),
        has_plant: project.plant.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_project_is_valid() {
        let project = default_project("tank");
        assert!(validate_project(&project).is_ok());
        let summary = summarize(&project);
        assert_eq!(summary.valves, vec!["fill", "drain"]);
        assert!(!summary.explicit_fuzzy);
        assert!(!summary.adapted);
        assert!(summary.has_plant);
    }

    #[test]
    fn unit_gains_are_not_persisted() {
        let mut project = default_project("tank");
        let unit = ValveMap::from([("fill".to_string(), 1.0), ("drain".to_string(), 1.0)]);
        store_gains(&mut project, &unit);
        assert!(project.gain_multipliers.is_empty());

        let learned = ValveMap::from([("fill".to_string(), 1.02), ("drain".to_string(), 1.0)]);
        store_gains(&mut project, &learned);
        assert_eq!(project.gain_multipliers["fill"], 1.02);
        assert!(summarize(&project).adapted);

        store_gains(&mut project, &unit);
        assert!(project.gain_multipliers.is_empty());
    }
}
