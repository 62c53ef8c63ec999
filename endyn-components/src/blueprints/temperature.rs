use crate::ids;
use endyn_core::framework::{Blueprint, Brought, CheckFailure, CheckResult, ComponentId};
use endyn_core::params::{ActivationEnergies, ModelParameters, TemperatureResponse};
use endyn_core::FloatValue;

/// Temperature of the environment
/// unit: K
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Temperature(pub FloatValue);

pub(crate) fn check_temperature(t: FloatValue) -> CheckResult {
    if t.is_finite() && t > 0.0 {
        Ok(())
    } else {
        Err(CheckFailure::new(
            "temperature",
            format!("{} K is not a positive temperature", t),
        ))
    }
}

impl Blueprint<ModelParameters> for Temperature {
    fn component(&self) -> ComponentId {
        ids::TEMPERATURE
    }

    fn name(&self) -> &'static str {
        "Temperature"
    }

    fn early_check(&self) -> CheckResult {
        check_temperature(self.0)
    }

    fn expand(&self, model: &mut ModelParameters) {
        model.temperature = Some(self.0);
    }
}

/// How growth, metabolism and mortality respond to the temperature.
#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureDependence {
    response: TemperatureResponse,
    temperature: Option<FloatValue>,
}

impl TemperatureDependence {
    /// Rates unaffected by temperature.
    pub fn flat() -> Self {
        Self {
            response: TemperatureResponse::Flat,
            temperature: None,
        }
    }

    /// Boltzmann-Arrhenius scaling with the default activation energies and a 293.15 K
    /// reference.
    pub fn boltzmann_arrhenius() -> Self {
        Self {
            response: TemperatureResponse::boltzmann_arrhenius(),
            temperature: None,
        }
    }

    pub fn with_activation(mut self, activation: ActivationEnergies) -> Self {
        if let TemperatureResponse::BoltzmannArrhenius { reference, .. } = self.response {
            self.response = TemperatureResponse::BoltzmannArrhenius {
                activation,
                reference,
            };
        }
        self
    }

    /// Also set the temperature, only if the model has none.
    pub fn at(mut self, temperature: FloatValue) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl Blueprint<ModelParameters> for TemperatureDependence {
    fn component(&self) -> ComponentId {
        ids::TEMPERATURE_RESPONSE
    }

    fn name(&self) -> &'static str {
        match self.response {
            TemperatureResponse::Flat => "TemperatureDependence::Flat",
            TemperatureResponse::BoltzmannArrhenius { .. } => {
                "TemperatureDependence::BoltzmannArrhenius"
            }
        }
    }

    fn brought(&self) -> Vec<Brought<ModelParameters>> {
        match self.temperature {
            Some(t) => vec![Brought::implied(Temperature(t))],
            None => vec![Brought::cannot_imply(ids::TEMPERATURE)],
        }
    }

    fn early_check(&self) -> CheckResult {
        if let TemperatureResponse::BoltzmannArrhenius {
            activation,
            reference,
        } = &self.response
        {
            check_temperature(*reference)?;
            for e in [activation.growth, activation.metabolism, activation.mortality] {
                if !e.is_finite() {
                    return Err(CheckFailure::new(
                        "activation",
                        format!("activation energy {} must be finite", e),
                    ));
                }
            }
        }
        Ok(())
    }

    fn expand(&self, model: &mut ModelParameters) {
        model.temperature_response = Some(self.response);
    }
}
