use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::config::{Activation, MlpConfig};
use crate::error::{PipelineError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::models::utils::{argmax, check_query, check_training_data, not_fitted};

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPS: f64 = 1e-8;

/// One dense layer with its Adam moment estimates.
struct Layer {
    weights: Array2<f64>,
    bias: Array1<f64>,
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl Layer {
    /// Glorot-uniform initialisation.
    fn new(fan_in: usize, fan_out: usize, activation: Activation, rng: &mut StdRng) -> Self {
        let factor = if activation == Activation::Logistic { 2.0 } else { 6.0 };
        let bound = (factor / (fan_in + fan_out) as f64).sqrt();
        Layer {
            weights: Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-bound..bound)),
            bias: Array1::from_shape_fn(fan_out, |_| rng.gen_range(-bound..bound)),
            m_w: Array2::zeros((fan_in, fan_out)),
            v_w: Array2::zeros((fan_in, fan_out)),
            m_b: Array1::zeros(fan_out),
            v_b: Array1::zeros(fan_out),
        }
    }

    fn forward(&self, input: &Array2<f64>) -> Array2<f64> {
        input.dot(&self.weights) + &self.bias
    }

    fn adam_step(&mut self, grad_w: &Array2<f64>, grad_b: &Array1<f64>, lr: f64, t: i32) {
        let correction1 = 1.0 - BETA1.powi(t);
        let correction2 = 1.0 - BETA2.powi(t);
        let step = lr * correction2.sqrt() / correction1;

        self.m_w = &self.m_w * BETA1 + grad_w * (1.0 - BETA1);
        self.v_w = &self.v_w * BETA2 + &grad_w.mapv(|g| g * g) * (1.0 - BETA2);
        self.m_b = &self.m_b * BETA1 + grad_b * (1.0 - BETA1);
        self.v_b = &self.v_b * BETA2 + &grad_b.mapv(|g| g * g) * (1.0 - BETA2);

        let update_w = &self.m_w / &self.v_w.mapv(|v| v.sqrt() + ADAM_EPS) * step;
        let update_b = &self.m_b / &self.v_b.mapv(|v| v.sqrt() + ADAM_EPS) * step;
        self.weights -= &update_w;
        self.bias -= &update_b;
    }
}

fn activate(activation: Activation, z: &mut Array2<f64>) {
    match activation {
        Activation::Relu => z.mapv_inplace(|v| v.max(0.0)),
        Activation::Tanh => z.mapv_inplace(f64::tanh),
        Activation::Logistic => z.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp())),
    }
}

/// Derivative of the activation written in terms of its output.
fn activation_derivative(activation: Activation, a: &Array2<f64>) -> Array2<f64> {
    match activation {
        Activation::Relu => a.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 }),
        Activation::Tanh => a.mapv(|v| 1.0 - v * v),
        Activation::Logistic => a.mapv(|v| v * (1.0 - v)),
    }
}

fn softmax_inplace(z: &mut Array2<f64>) {
    for mut row in z.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
}

/// Multilayer perceptron with a softmax output, trained by mini-batch Adam
/// on L2-penalised cross-entropy.
pub struct MlpClassifier {
    config: MlpConfig,
    layers: Vec<Layer>,
    n_features: usize,
    /// Mean training loss after each epoch.
    loss_curve: Vec<f64>,
}

impl MlpClassifier {
    pub fn new(config: MlpConfig) -> Self {
        MlpClassifier {
            config,
            layers: Vec::new(),
            n_features: 0,
            loss_curve: Vec::new(),
        }
    }

    pub fn loss_curve(&self) -> &[f64] {
        &self.loss_curve
    }

    /// Activations of every layer, input first and softmax output last.
    fn forward_pass(&self, x: &Array2<f64>) -> Vec<Array2<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(x.to_owned());
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = layer.forward(&activations[i]);
            if i == last {
                softmax_inplace(&mut z);
            } else {
                activate(self.config.activation, &mut z);
            }
            activations.push(z);
        }
        activations
    }

    /// One Adam update on a mini-batch. Returns the batch loss.
    fn train_batch(&mut self, x: &Array2<f64>, targets: &Array2<f64>, t: i32) -> f64 {
        let n = x.nrows() as f64;
        let activations = self.forward_pass(x);
        let output = &activations[activations.len() - 1];

        let cross_entropy = -(targets * &output.mapv(|p| p.max(1e-12).ln())).sum() / n;
        let penalty: f64 = self
            .layers
            .iter()
            .map(|l| l.weights.mapv(|w| w * w).sum())
            .sum::<f64>()
            * self.config.alpha
            / (2.0 * n);

        let mut delta = (output - targets) / n;
        for i in (0..self.layers.len()).rev() {
            let grad_w = activations[i].t().dot(&delta) + &self.layers[i].weights * (self.config.alpha / n);
            let grad_b = delta.sum_axis(Axis(0));
            if i > 0 {
                delta = delta.dot(&self.layers[i].weights.t())
                    * activation_derivative(self.config.activation, &activations[i]);
            }
            self.layers[i].adam_step(&grad_w, &grad_b, self.config.learning_rate, t);
        }

        cross_entropy + penalty
    }
}

impl ClassifierModel for MlpClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<usize>) -> Result<()> {
        check_training_data(x, y)?;
        let cfg = self.config.clone();
        let n_classes = y.iter().copied().max().unwrap_or(0) + 1;
        let mut rng = StdRng::seed_from_u64(cfg.seed);

        let mut sizes = vec![x.ncols()];
        sizes.extend(cfg.hidden_layer_sizes.iter().copied());
        sizes.push(n_classes);
        self.layers = sizes
            .windows(2)
            .map(|w| Layer::new(w[0], w[1], cfg.activation, &mut rng))
            .collect();
        self.n_features = x.ncols();
        self.loss_curve.clear();

        let mut targets = Array2::<f64>::zeros((y.len(), n_classes));
        for (row, &code) in y.iter().enumerate() {
            targets[(row, code)] = 1.0;
        }

        let batch_size = cfg.batch_size.min(x.nrows());
        let mut order: Vec<usize> = (0..x.nrows()).collect();
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut t = 0;

        for epoch in 0..cfg.max_epochs {
            order.shuffle(&mut rng);
            let mut epoch_loss = 0.0;
            for batch in order.chunks(batch_size) {
                t += 1;
                let xb = x.select(Axis(0), batch);
                let yb = targets.select(Axis(0), batch);
                epoch_loss += self.train_batch(&xb, &yb, t) * batch.len() as f64;
            }
            epoch_loss /= x.nrows() as f64;
            if !epoch_loss.is_finite() {
                return Err(PipelineError::Model(format!(
                    "MLP training diverged at epoch {}",
                    epoch + 1
                )));
            }
            self.loss_curve.push(epoch_loss);

            if epoch_loss > best_loss - cfg.tolerance {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(epoch_loss);
            if no_improvement >= cfg.n_iter_no_change {
                log::trace!(
                    "MLP stopped after {} epochs, loss {:.6}",
                    epoch + 1,
                    epoch_loss
                );
                break;
            }
        }
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<usize>> {
        if self.layers.is_empty() {
            return Err(not_fitted(self.name()));
        }
        check_query(x, self.n_features)?;
        let activations = self.forward_pass(x);
        let output = &activations[activations.len() - 1];
        Ok(output.axis_iter(Axis(0)).map(argmax).collect())
    }

    fn name(&self) -> &str {
        "mlp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn xor() -> (Array2<f64>, Array1<usize>) {
        (
            array![[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]],
            array![0usize, 1, 1, 0],
        )
    }

    #[test]
    fn softmax_rows_sum_to_one() {
        let mut z = array![[1.0, 2.0, 3.0], [1000.0, 1000.0, 1000.0]];
        softmax_inplace(&mut z);
        for row in z.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.0).abs() < 1e-12);
        }
        assert!((z[(1, 0)] - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn learns_xor() {
        let (x, y) = xor();
        let mut mlp = MlpClassifier::new(MlpConfig {
            hidden_layer_sizes: vec![16],
            activation: Activation::Tanh,
            learning_rate: 0.05,
            max_epochs: 2000,
            batch_size: 4,
            tolerance: 0.0,
            n_iter_no_change: 2000,
            ..MlpConfig::default()
        });
        mlp.fit(&x, &y).unwrap();
        assert_eq!(mlp.predict(&x).unwrap(), y);
        let curve = mlp.loss_curve();
        assert!(curve[curve.len() - 1] < curve[0]);
    }

    #[test]
    fn same_seed_same_predictions() {
        let x = array![[-1.0, -1.0], [-0.5, -0.8], [1.0, 1.2], [0.7, 0.9], [0.0, 3.0], [0.2, 2.5]];
        let y = array![0usize, 0, 1, 1, 2, 2];
        let config = MlpConfig {
            hidden_layer_sizes: vec![8, 4],
            max_epochs: 50,
            ..MlpConfig::default()
        };
        let mut a = MlpClassifier::new(config.clone());
        let mut b = MlpClassifier::new(config);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.loss_curve(), b.loss_curve());
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn predict_before_fit_fails() {
        let mlp = MlpClassifier::new(MlpConfig::default());
        assert!(mlp.predict(&array![[0.0, 1.0]]).is_err());
    }
}
