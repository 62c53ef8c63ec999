//! Identifiers of every component of the catalogue.

use endyn_core::framework::ComponentId;

pub const SPECIES: ComponentId = ComponentId::new("Species");
pub const FOODWEB: ComponentId = ComponentId::new("Foodweb");
pub const BODY_MASS: ComponentId = ComponentId::new("BodyMass");
pub const METABOLIC_CLASS: ComponentId = ComponentId::new("MetabolicClass");

pub const GROWTH_RATE: ComponentId = ComponentId::new("GrowthRate");
pub const METABOLISM: ComponentId = ComponentId::new("Metabolism");
pub const MORTALITY: ComponentId = ComponentId::new("Mortality");
pub const CARRYING_CAPACITY: ComponentId = ComponentId::new("CarryingCapacity");
pub const MAX_CONSUMPTION: ComponentId = ComponentId::new("MaxConsumption");
pub const HALF_SATURATION_DENSITY: ComponentId = ComponentId::new("HalfSaturationDensity");
pub const INTRASPECIFIC_INTERFERENCE: ComponentId = ComponentId::new("IntraspecificInterference");
pub const CONSUMPTION_RATE: ComponentId = ComponentId::new("ConsumptionRate");

pub const EFFICIENCY: ComponentId = ComponentId::new("Efficiency");
pub const CONSUMERS_PREFERENCES: ComponentId = ComponentId::new("ConsumersPreferences");
pub const ATTACK_RATE: ComponentId = ComponentId::new("AttackRate");
pub const HANDLING_TIME: ComponentId = ComponentId::new("HandlingTime");
pub const PRODUCERS_COMPETITION: ComponentId = ComponentId::new("ProducersCompetition");
pub const HILL_EXPONENT: ComponentId = ComponentId::new("HillExponent");

pub const BIOENERGETIC_RESPONSE: ComponentId = ComponentId::new("BioenergeticResponse");
pub const CLASSIC_RESPONSE: ComponentId = ComponentId::new("ClassicResponse");
pub const LINEAR_RESPONSE: ComponentId = ComponentId::new("LinearResponse");

pub const LOGISTIC_GROWTH: ComponentId = ComponentId::new("LogisticGrowth");
pub const NUTRIENT_INTAKE: ComponentId = ComponentId::new("NutrientIntake");

pub const NUTRIENTS: ComponentId = ComponentId::new("Nutrients");
pub const NUTRIENTS_TURNOVER: ComponentId = ComponentId::new("NutrientsTurnover");
pub const NUTRIENTS_SUPPLY: ComponentId = ComponentId::new("NutrientsSupply");
pub const NUTRIENTS_CONCENTRATION: ComponentId = ComponentId::new("NutrientsConcentration");
pub const NUTRIENTS_HALF_SATURATION: ComponentId = ComponentId::new("NutrientsHalfSaturation");

pub const COMPETITION_LAYER: ComponentId = ComponentId::new("CompetitionLayer");
pub const FACILITATION_LAYER: ComponentId = ComponentId::new("FacilitationLayer");
pub const INTERFERENCE_LAYER: ComponentId = ComponentId::new("InterferenceLayer");
pub const REFUGE_LAYER: ComponentId = ComponentId::new("RefugeLayer");

pub const TEMPERATURE: ComponentId = ComponentId::new("Temperature");
pub const TEMPERATURE_RESPONSE: ComponentId = ComponentId::new("TemperatureResponse");
