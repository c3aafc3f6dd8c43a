use std::collections::BTreeMap;

use lf_project::schema::*;
use lf_project::validate::rule_keys;
use lf_project::{load, load_json, load_yaml, save, save_json, save_yaml, validate_project};

fn tank_project() -> Project {
    Project {
        version: 1,
        name: "Tank".to_string(),
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
        tuning: TuningDef::default(),
        fuzzy: None,
        adaptation: AdaptationDef::default(),
        timing: TimingDef::default(),
        gain_multipliers: BTreeMap::new(),
        plant: Some(PlantDef {
            leaks: vec![LeakDef {
                t_s: 60.0,
                outflow_m3_s: 0.004,
            }],
            setpoints: vec![SetpointDef {
                t_s: 300.0,
                level_m: 2.5,
            }],
            ..PlantDef::default()
        }),
    }
}

#[test]
fn roundtrip_yaml_tank_project() {
    let project = tank_project();
    validate_project(&project).unwrap();

    let path = std::env::temp_dir().join("lf_project_roundtrip_tank.yaml");
    save_yaml(&path, &project).unwrap();
    let loaded = load_yaml(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn roundtrip_json_with_explicit_fuzzy_and_gains() {
    let mut project = tank_project();
    project.fuzzy = Some(FuzzyDef {
        universe_max: 3.3,
        error_sets: ErrorSetsDef {
            nh: [-1.7, -1.7, -0.2975],
            nl: [-0.34, -0.17, -0.125],
            z: [-0.125, 0.0, 0.125],
            pl: [0.125, 0.33, 0.66],
            ph: [0.5775, 3.3, 3.3],
        },
        rules: rule_keys()
            .map(|k| (k, BTreeMap::from([("fill".to_string(), 0.5)])))
            .collect(),
    });
    project.gain_multipliers.insert("fill".to_string(), 1.12);

    let path = std::env::temp_dir().join("lf_project_roundtrip_tank.json");
    save_json(&path, &project).unwrap();
    let loaded = load_json(&path).unwrap();

    assert_eq!(project, loaded);
}

#[test]
fn format_follows_extension() {
    let project = tank_project();
    let path = std::env::temp_dir().join("lf_project_by_extension.yml");
    save(&path, &project).unwrap();
    assert_eq!(load(&path).unwrap(), project);

    let bad = std::env::temp_dir().join("lf_project_by_extension.toml");
    assert!(save(&bad, &project).is_err());
}

#[test]
fn minimal_yaml_uses_defaults() {
    let yaml = r#"
version: 1
name: Minimal
valves:
  - { name: fill, min_out: 0.0, max_out: 10.0 }
  - { name: drain, min_out: 0.0, max_out: 10.0 }
tuning:
  min_level: 0.0
  max_level: 4.0
  set_level: 2.0
"#;
    let project: Project = serde_yaml::from_str(yaml).unwrap();
    validate_project(&project).unwrap();
    assert_eq!(project.tuning.aggressiveness, 4.0);
    assert_eq!(project.tuning.precision, 2.0);
    assert_eq!(project.adaptation, AdaptationDef::default());
    assert_eq!(project.timing.control_period_s, 0.5);
    assert!(project.plant.is_none());
}
