//! Models assembled from blueprints, then simulated.

use approx::assert_abs_diff_eq;
use endyn_components::blueprints::{
    default_model, BodyMass, BoxedBlueprint, ClassicResponse, Foodweb, LinkSource,
    LogisticGrowth, NontrophicLayer, RateKind, Rates, Species,
};
use endyn_components::{ids, Model};
use endyn_core::errors::EndynError;
use endyn_core::ivp::{Algorithm, RetCode};
use endyn_core::params::{InteractionKind, ResponseKind};
use endyn_core::simulate::{InitialState, SimulationConfig, SteadyState};
use ndarray::array;

fn predator_prey() -> Model {
    let r = 0.2268;
    let blueprints: Vec<BoxedBlueprint> = vec![
        Box::new(Species::names(["grass", "rabbit"])),
        Box::new(Foodweb::from_lists([("rabbit", vec!["grass"])])),
        Box::new(BodyMass::flat(1.0)),
        Box::new(Rates::raw(RateKind::GrowthRate, vec![r, 0.0])),
        Box::new(Rates::raw(RateKind::Metabolism, vec![0.0, 0.314 * r])),
        Box::new(Rates::flat(RateKind::Mortality, 0.0)),
        Box::new(
            ClassicResponse::new()
                .with_attack_rate(LinkSource::Flat(1.0))
                .with_handling_time(LinkSource::Flat(1.0))
                .with_efficiency(LinkSource::Flat(0.45))
                .with_hill_exponent(1.0),
        ),
        Box::new(LogisticGrowth::new()),
    ];
    Model::from_blueprints(blueprints).unwrap()
}

mod assembly {
    use super::*;

    #[test]
    fn predator_prey_parameters() {
        let model = predator_prey();
        assert_eq!(model.species_names(), ["grass", "rabbit"]);
        let params = model.parameters();
        assert_eq!(params.functional_response, Some(ResponseKind::Classic));
        assert_eq!(params.consumers_preferences, Some(array![[0.0, 0.0], [1.0, 0.0]]));
        assert_eq!(params.carrying_capacity, Some(array![1.0, 0.0]));
        assert_eq!(params.intraspecific_interference, Some(array![0.0, 0.0]));
        assert_eq!(model.blueprint_of(ids::CARRYING_CAPACITY), Some("Rates::Flat"));
        assert_eq!(model.blueprint_of(ids::EFFICIENCY), Some("LinkRates::Flat"));
    }

    #[test]
    fn failing_batch_leaves_the_model_untouched() {
        let mut model = Model::new();
        model
            .add(Foodweb::matrix(array![[false, false], [true, false]]))
            .unwrap();
        let before = serde_json::to_value(model.parameters()).unwrap();
        let rendered = model.to_string();

        // The consumer cannot grow on its own.
        let batch: Vec<BoxedBlueprint> = vec![
            Box::new(BodyMass::flat(1.0)),
            Box::new(Rates::raw(RateKind::GrowthRate, vec![1.0, 1.0])),
        ];
        let err = model.add_all(batch).unwrap_err();
        assert!(matches!(err, EndynError::LateCheck { .. }));

        assert_eq!(serde_json::to_value(model.parameters()).unwrap(), before);
        assert_eq!(model.to_string(), rendered);
        assert!(!model.has_component(ids::BODY_MASS));
    }

    #[test]
    fn allometric_body_mass_without_foodweb() {
        let mut model = Model::new();
        assert_eq!(
            model.add(BodyMass::from_z(10.0)).unwrap_err(),
            EndynError::MissingRequiredComponent {
                blueprint: "BodyMass::FromZ".to_string(),
                required: "Foodweb".to_string(),
            }
        );
        assert_eq!(model.n_components(), 0);
    }

    #[test]
    fn refuges_need_the_classic_response() {
        let mut model = Model::default_for(Foodweb::matrix(array![
            [false, false, false],
            [true, false, false],
            [false, true, false],
        ]))
        .unwrap();
        let mut links = ndarray::Array2::from_elem((3, 3), false);
        links[[1, 0]] = true;
        assert!(matches!(
            model.add(NontrophicLayer::matrix(InteractionKind::Refuge, links)),
            Err(EndynError::ConflictingComponents { .. })
        ));
    }
}

mod simulation {
    use super::*;

    #[test]
    fn predator_prey_reaches_its_equilibrium() {
        let model = predator_prey();
        for algorithm in [
            Algorithm::default(),
            Algorithm::Dop853 {
                rtol: 1e-8,
                atol: 1e-10,
            },
            Algorithm::Rk4 { substeps: 10 },
        ] {
            let config = SimulationConfig::new(5000.0)
                .with_algorithm(algorithm)
                .with_steady_state(SteadyState::default());
            let solution = model
                .simulate(&InitialState::new(vec![0.5, 0.5]), &config)
                .unwrap();
            assert_eq!(solution.retcode(), RetCode::Terminated, "{:?}", algorithm);
            let last = solution.final_biomass();
            assert_abs_diff_eq!(last[0], 0.188, epsilon = 1e-2);
            assert_abs_diff_eq!(last[1], 0.219, epsilon = 1e-2);
            assert!(solution.extinct_species().is_empty());
        }
    }

    #[test]
    fn default_model_runs() {
        let foodweb = Foodweb::matrix(array![
            [false, false, false],
            [true, false, false],
            [false, true, false],
        ]);
        let model = Model::from_blueprints(default_model(foodweb)).unwrap();
        let config = SimulationConfig::from_toml_str(
            r#"
            tmax = 100.0
            dt = 0.5
            "#,
        )
        .unwrap();
        let solution = model.simulate(&InitialState::new(0.5), &config).unwrap();
        assert!(solution.is_successful());
        assert_eq!(solution.n_species(), 3);
        assert!(solution
            .biomass()
            .iter()
            .all(|b| b.is_finite() && *b >= 0.0));
        // The producer persists under the bioenergetic response.
        assert!(solution.final_biomass()[0] > 0.0);
    }

    #[test]
    fn rates_can_be_tuned_between_runs() {
        let mut model = predator_prey();
        let initial = InitialState::new(vec![0.5, 0.5]);
        let config = SimulationConfig::new(100.0);
        let before = model.simulate(&initial, &config).unwrap().final_biomass();

        model.set_at("x", 1, 0.5).unwrap();
        let starving = model.simulate(&initial, &config).unwrap();
        assert!(starving.final_biomass()[1] < before[1]);
        assert!(starving.extinct_species().contains_key(&1));
    }
}
