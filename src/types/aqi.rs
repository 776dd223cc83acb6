use std::fmt;

/// CPCB AQI category breakpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AqiCategory {
    Good,
    Satisfactory,
    Moderate,
    Poor,
    VeryPoor,
    Severe,
}

impl AqiCategory {
    /// Categorizes a numeric AQI value. Values are clamped conceptually: any
    /// reading above 400 is `Severe`.
    pub fn from_value(aqi: f64) -> Self {
        if aqi <= 50.0 {
            AqiCategory::Good
        } else if aqi <= 100.0 {
            AqiCategory::Satisfactory
        } else if aqi <= 200.0 {
            AqiCategory::Moderate
        } else if aqi <= 300.0 {
            AqiCategory::Poor
        } else if aqi <= 400.0 {
            AqiCategory::VeryPoor
        } else {
            AqiCategory::Severe
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AqiCategory::Good => "Good",
            AqiCategory::Satisfactory => "Satisfactory",
            AqiCategory::Moderate => "Moderate",
            AqiCategory::Poor => "Poor",
            AqiCategory::VeryPoor => "Very Poor",
            AqiCategory::Severe => "Severe",
        }
    }
}

impl fmt::Display for AqiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breakpoints() {
        assert_eq!(AqiCategory::from_value(0.0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_value(50.0), AqiCategory::Good);
        assert_eq!(AqiCategory::from_value(50.1), AqiCategory::Satisfactory);
        assert_eq!(AqiCategory::from_value(100.0), AqiCategory::Satisfactory);
        assert_eq!(AqiCategory::from_value(150.0), AqiCategory::Moderate);
        assert_eq!(AqiCategory::from_value(250.0), AqiCategory::Poor);
        assert_eq!(AqiCategory::from_value(400.0), AqiCategory::VeryPoor);
        assert_eq!(AqiCategory::from_value(401.0), AqiCategory::Severe);
    }

    #[test]
    fn labels() {
        assert_eq!(AqiCategory::VeryPoor.to_string(), "Very Poor");
        assert_eq!(AqiCategory::Good.to_string(), "Good");
    }
}
