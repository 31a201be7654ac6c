use common::DeliveryMode;
use crate::address;
use crate::config::GatewayConfig;
use crate::errors::ControllerError;

/// How much adaptive normalisation a strategy applies before delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Transport marker rewrite plus manifest extension
    Full,
    TransportMarkerOnly,
}

impl Normalization {
    fn apply(&self, address: &str) -> String {
        match self {
            Normalization::Full => address::normalize_adaptive(address),
            Normalization::TransportMarkerOnly => address::normalize_transport_marker(address),
        }
    }
}

/// Pure address transform carried by a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Normalised address, no relay
    Normalized(Normalization),
    /// Normalised address wrapped inside a relay template
    Relay {
        template: String,
        normalization: Normalization,
    },
    /// Address unchanged
    Passthrough,
}

impl Transform {
    pub fn apply(&self, address: &str) -> String {
        match self {
            Transform::Normalized(normalization) => normalization.apply(address),
            Transform::Relay { template, normalization } => {
                address::wrap_in_relay(template, &normalization.apply(address))
            }
            Transform::Passthrough => address.trim().to_string(),
        }
    }
}

/// A named way of turning a canonical address into a deliverable one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Strategy {
    pub name: String,
    pub mode: DeliveryMode,
    pub transform: Transform,
}

impl Strategy {
    pub fn new(name: impl Into<String>, mode: DeliveryMode, transform: Transform) -> Self {
        Self {
            name: name.into(),
            mode,
            transform,
        }
    }
}

/// Output of resolving an address through one strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub strategy_index: usize,
    pub strategy_name: String,
    pub address: String,
    pub mode: DeliveryMode,
}

/// Ordered, immutable list of delivery strategies. Position is identity and
/// escalation order.
#[derive(Debug, Clone)]
pub struct StrategyCatalog {
    strategies: Vec<Strategy>,
}

impl StrategyCatalog {
    pub fn new(strategies: Vec<Strategy>) -> Result<Self, ControllerError> {
        if strategies.is_empty() {
            return Err(ControllerError::configuration(
                "Strategy catalog needs at least one strategy",
            ));
        }
        Ok(Self { strategies })
    }

    /// Direct, Gateway-1, Gateway-2, Native
    pub fn standard(gateways: &GatewayConfig) -> Self {
        Self {
            strategies: vec![
                Strategy::new(
                    "Direct",
                    DeliveryMode::Adaptive,
                    Transform::Normalized(Normalization::Full),
                ),
                Strategy::new(
                    "Gateway-1",
                    DeliveryMode::Adaptive,
                    Transform::Relay {
                        template: gateways.primary_template.clone(),
                        normalization: Normalization::Full,
                    },
                ),
                Strategy::new(
                    "Gateway-2",
                    DeliveryMode::Adaptive,
                    Transform::Relay {
                        template: gateways.secondary_template.clone(),
                        normalization: Normalization::TransportMarkerOnly,
                    },
                ),
                Strategy::new("Native", DeliveryMode::Direct, Transform::Passthrough),
            ],
        }
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.strategies.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&Strategy> {
        self.strategies.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Strategy> {
        self.strategies.iter()
    }

    /// First strategy that hands the raw address to the non-adaptive path
    pub fn first_direct_index(&self) -> Option<usize> {
        self.strategies
            .iter()
            .position(|strategy| strategy.mode == DeliveryMode::Direct)
    }

    pub fn resolve(&self, index: usize, address: &str) -> Option<ResolvedAddress> {
        self.get(index).map(|strategy| ResolvedAddress {
            strategy_index: index,
            strategy_name: strategy.name.clone(),
            address: strategy.transform.apply(address),
            mode: strategy.mode,
        })
    }
}

impl Default for StrategyCatalog {
    fn default() -> Self {
        Self::standard(&GatewayConfig::default())
    }
}
