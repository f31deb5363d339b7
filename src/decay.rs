use crate::error::{Error, Result};

/// A value that decays one step at a time
pub trait Decay {
    /// The value before any decay has been applied
    fn initial(&self) -> f32;

    /// The value one step after `value`
    fn next(&self, value: f32) -> f32;
}

fn validate(rate: f32, vi: f32, vf: f32) -> Result<()> {
    (rate > 0.0 && rate <= 1.0 && vi >= vf)
        .then_some(())
        .ok_or_else(|| {
            Error::InvalidConfig(format!(
                "decay rate must be in (0, 1] and start ({vi}) must not be below floor ({vf}), got rate {rate}"
            ))
        })
}

/// A constant value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constant {
    value: f32,
}

impl Constant {
    pub fn new(value: f32) -> Self {
        Self { value }
    }
}

impl Decay for Constant {
    fn initial(&self) -> f32 {
        self.value
    }

    fn next(&self, _value: f32) -> f32 {
        self.value
    }
}

/// v<sub>t+1</sub> = max(v<sub>t</sub> * r, v<sub>f</sub>), starting from v<sub>i</sub>
#[derive(Debug, Clone, PartialEq)]
pub struct Geometric {
    rate: f32,
    vi: f32,
    vf: f32,
}

impl Geometric {
    pub fn new(rate: f32, vi: f32, vf: f32) -> Result<Self> {
        validate(rate, vi, vf)?;
        Ok(Self { rate, vi, vf })
    }

    pub fn floor(&self) -> f32 {
        self.vf
    }
}

impl Decay for Geometric {
    fn initial(&self) -> f32 {
        self.vi
    }

    fn next(&self, value: f32) -> f32 {
        let &Self { rate, vf, .. } = self;
        (value * rate).max(vf)
    }
}
