use lin_reg::sigmoid;

/// The inverse link functions mapping a linear predictor onto a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    /// The identity function, used by linear models
    Identity,
    /// The logistic sigmoid, used by logistic models
    Logistic,
}

impl Link {
    /// Apply the link to a single linear predictor
    #[inline(always)]
    pub fn apply(&self, eta: f64) -> f64 {
        match self {
            Link::Identity => eta,
            Link::Logistic => sigmoid(eta),
        }
    }

    /// Apply the link over all elements
    pub fn activate(&self, vals: &mut [f64]) {
        match self {
            Link::Identity => {}
            Link::Logistic => {
                for v in vals {
                    *v = sigmoid(*v);
                }
            }
        }
    }
}
