//! Schema migration framework.

use crate::ProjectError;
use crate::schema::Project;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut project: Project) -> Result<Project, ProjectError> {
    while project.version < LATEST_VERSION {
        project = migrate_one_version(project)?;
    }
    Ok(project)
}

fn migrate_one_version(project: Project) -> Result<Project, ProjectError> {
    match project.version {
        0 => migrate_v0_to_v1(project),
        v => Err(ProjectError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 0 files stored gains for every valve, including untouched ones
/// at exactly 1.0. Those entries carry no adaptation and are dropped so
/// that loading does not mark the controller adapted.
fn migrate_v0_to_v1(mut project: Project) -> Result<Project, ProjectError> {
    if project.gain_multipliers.values().all(|g| *g == 1.0) {
        project.gain_multipliers.clear();
    }
    project.version = 1;
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ValveDef;

    fn project(version: u32) -> Project {
        Project {
            version,
            name: "tank".into(),
            valves: vec![ValveDef {
                name: "fill".into(),
                min_out: 0.0,
                max_out: 10.0,
            }],
            tuning: Default::default(),
            fuzzy: None,
            adaptation: Default::default(),
            timing: Default::default(),
            gain_multipliers: [("fill".to_string(), 1.0)].into(),
            plant: None,
        }
    }

    #[test]
    fn v0_drops_unit_gains() {
        let migrated = migrate_to_latest(project(0)).unwrap();
        assert_eq!(migrated.version, LATEST_VERSION);
        assert!(migrated.gain_multipliers.is_empty());
    }

    #[test]
    fn v0_keeps_adapted_gains() {
        let mut p = project(0);
        p.gain_multipliers.insert("fill".into(), 1.2);
        let migrated = migrate_to_latest(p).unwrap();
        assert_eq!(migrated.gain_multipliers["fill"], 1.2);
    }

    #[test]
    fn latest_is_untouched() {
        let p = project(1);
        assert_eq!(migrate_to_latest(p.clone()).unwrap(), p);
    }
}
