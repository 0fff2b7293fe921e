use std::fmt::Debug;

use crate::prelude::*;

pub mod material;
pub mod position;

pub use material::MaterialEvaluator;
pub use position::PositionalEvaluator;

/// Static evaluation, relative to the side to move.
///
/// Implementations are shared by every search thread, so they must be
/// deterministic and free of interior mutability.
pub trait Evaluator: Send + Sync + Debug {
    fn evaluate(&self, board: &Board) -> i32;
    fn name(&self) -> &str;
}

/// Weighted sum of other evaluators
#[derive(Debug)]
pub struct CompositeEvaluator {
    name: String,
    evaluators: Vec<Box<dyn Evaluator>>,
    weights: Vec<f32>,
}

impl Default for CompositeEvaluator {
    fn default() -> Self {
        Self::balanced()
    }
}

impl CompositeEvaluator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            evaluators: Vec::new(),
            weights: Vec::new(),
        }
    }

    /// Material plus piece-square tables. The engine default.
    pub fn balanced() -> Self {
        let mut composite = Self::new("Balanced");
        composite.add_evaluator(Box::new(PositionalEvaluator::new()), 1.0);
        composite
    }

    pub fn add_evaluator(&mut self, evaluator: Box<dyn Evaluator>, weight: f32) -> &mut Self {
        self.evaluators.push(evaluator);
        self.weights.push(weight);
        self
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }
}

impl Evaluator for CompositeEvaluator {
    fn evaluate(&self, board: &Board) -> i32 {
        self.evaluators
            .iter()
            .zip(self.weights.iter())
            .map(|(evaluator, &weight)| evaluator.evaluate(board) as f32 * weight)
            .sum::<f32>() as i32
    }

    fn name(&self) -> &str {
        &self.name
    }
}
