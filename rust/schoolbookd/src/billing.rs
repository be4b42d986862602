use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Basic,
    Premium,
}

impl Plan {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Plan::Free),
            "basic" => Some(Plan::Basic),
            "premium" => Some(Plan::Premium),
            _ => None,
        }
    }

    /// The stored plan string is trusted as-is; anything unrecognised is free.
    pub fn from_stored(raw: Option<&str>) -> Self {
        match raw {
            None => Plan::Free,
            Some(s) => Plan::parse(s).unwrap_or_else(|| {
                warn!(plan = %s, "unknown plan, treating as free");
                Plan::Free
            }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Basic => "basic",
            Plan::Premium => "premium",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Features {
    pub can_view_finance: bool,
    pub can_use_payroll: bool,
    pub can_use_ai: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Finance,
    Payroll,
    Ai,
}

impl Feature {
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Finance => "finance",
            Feature::Payroll => "payroll",
            Feature::Ai => "ai",
        }
    }
}

impl Features {
    pub fn allows(&self, feature: Feature) -> bool {
        match feature {
            Feature::Finance => self.can_view_finance,
            Feature::Payroll => self.can_use_payroll,
            Feature::Ai => self.can_use_ai,
        }
    }
}

pub fn features_for(plan: Plan) -> Features {
    match plan {
        Plan::Free => Features::default(),
        Plan::Basic => Features {
            can_view_finance: true,
            ..Features::default()
        },
        Plan::Premium => Features {
            can_view_finance: true,
            can_use_payroll: true,
            can_use_ai: true,
        },
    }
}
