use crate::error::{Result, SearchError};
use crate::param;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const BETA_1: f64 = 0.9;
const BETA_2: f64 = 0.999;
const EPSILON: f64 = 1e-8;

/// Training configuration of a multi-layer perceptron regressor.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MlpConfig {
    /// Width of each hidden layer, input side first
    pub hidden_layers: Vec<usize>,
    pub learning_rate: f64,
    /// L2 penalty
    pub alpha: f64,
    /// Maximum number of epochs
    pub max_iter: usize,
    pub batch_size: usize,
    pub tol: f64,
    pub n_iter_no_change: usize,
    pub seed: u64,
}

impl MlpConfig {
    pub fn new(hidden_layers: Vec<usize>, cv: &param::CV) -> MlpConfig {
        MlpConfig {
            hidden_layers,
            learning_rate: 1e-3,
            alpha: 1e-4,
            max_iter: cv.max_iter,
            batch_size: cv.batch_size,
            tol: cv.tol,
            n_iter_no_change: cv.n_iter_no_change,
            seed: cv.model_seed,
        }
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> MlpConfig {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> MlpConfig {
        self.alpha = alpha;
        self
    }

    pub fn check(&self) -> Result<()> {
        if self.hidden_layers.is_empty() || self.hidden_layers.iter().any(|&w| w == 0) {
            return Err(SearchError::Evaluation(format!(
                "invalid hidden layers {:?}",
                self.hidden_layers
            )));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(SearchError::Evaluation(format!(
                "invalid learning rate {}",
                self.learning_rate
            )));
        }
        if !(self.alpha >= 0.0 && self.alpha.is_finite()) {
            return Err(SearchError::Evaluation(format!("invalid alpha {}", self.alpha)));
        }
        if self.max_iter == 0 || self.batch_size == 0 {
            return Err(SearchError::Evaluation(
                "max_iter and batch_size must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Fully connected layer, weights stored output-major (`n_out` rows of `n_in` values).
#[derive(Clone, Debug)]
struct Layer {
    weights: Vec<f64>,
    bias: Vec<f64>,
    n_in: usize,
    n_out: usize,
}

impl Layer {
    /// Glorot uniform initialisation
    fn new(n_in: usize, n_out: usize, rng: &mut ChaCha8Rng) -> Layer {
        let bound = (6.0 / (n_in + n_out) as f64).sqrt();
        Layer {
            weights: (0..n_in * n_out).map(|_| rng.gen_range(-bound..bound)).collect(),
            bias: (0..n_out).map(|_| rng.gen_range(-bound..bound)).collect(),
            n_in,
            n_out,
        }
    }

    fn forward(&self, input: &[f64], output: &mut [f64], relu: bool) {
        for o in 0..self.n_out {
            let row = &self.weights[o * self.n_in..(o + 1) * self.n_in];
            let z = self.bias[o] + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>();
            output[o] = if relu { z.max(0.0) } else { z };
        }
    }
}

/// Adam moments for one layer
#[derive(Clone, Debug)]
struct Moments {
    m_weights: Vec<f64>,
    v_weights: Vec<f64>,
    m_bias: Vec<f64>,
    v_bias: Vec<f64>,
}

impl Moments {
    fn new(layer: &Layer) -> Moments {
        Moments {
            m_weights: vec![0.0; layer.weights.len()],
            v_weights: vec![0.0; layer.weights.len()],
            m_bias: vec![0.0; layer.bias.len()],
            v_bias: vec![0.0; layer.bias.len()],
        }
    }
}

fn adam_step(params: &mut [f64], grads: &[f64], m: &mut [f64], v: &mut [f64], step: f64) {
    for i in 0..params.len() {
        m[i] = BETA_1 * m[i] + (1.0 - BETA_1) * grads[i];
        v[i] = BETA_2 * v[i] + (1.0 - BETA_2) * grads[i] * grads[i];
        params[i] -= step * m[i] / (v[i].sqrt() + EPSILON);
    }
}

/// Per-column standardisation fitted on the training rows.
#[derive(Clone, Debug)]
struct Standardizer {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Standardizer {
    fn fit(x: &[f64], n_features: usize) -> Standardizer {
        let n = (x.len() / n_features) as f64;
        let mut mean = vec![0.0; n_features];
        for row in x.chunks(n_features) {
            for (m, v) in mean.iter_mut().zip(row) {
                *m += v;
            }
        }
        mean.iter_mut().for_each(|m| *m /= n);

        let mut scale = vec![0.0; n_features];
        for row in x.chunks(n_features) {
            for j in 0..n_features {
                scale[j] += (row[j] - mean[j]).powi(2);
            }
        }
        // Constant columns are left unscaled
        scale
            .iter_mut()
            .for_each(|s| *s = if *s > 0.0 { (*s / n).sqrt() } else { 1.0 });

        Standardizer { mean, scale }
    }

    fn transform(&self, x: &[f64]) -> Vec<f64> {
        let n_features = self.mean.len();
        x.iter()
            .enumerate()
            .map(|(i, v)| (v - self.mean[i % n_features]) / self.scale[i % n_features])
            .collect()
    }
}

/// Multi-layer perceptron regressor: ReLU hidden layers, identity output, squared loss
/// with L2 penalty, trained by mini-batch Adam.
///
/// Training is fully determined by the configuration seed and the data: two fits on
/// identical inputs yield bit-identical predictions.
#[derive(Clone, Debug)]
pub struct MlpRegressor {
    layers: Vec<Layer>,
    x_scaler: Standardizer,
    y_mean: f64,
    y_scale: f64,
    pub n_iter: usize,
    pub loss: f64,
}

impl MlpRegressor {
    /// Train a fresh model on a row-major matrix `x` of `n_features` columns.
    pub fn fit(config: &MlpConfig, x: &[f64], n_features: usize, y: &[f64]) -> Result<MlpRegressor> {
        config.check()?;
        let n = y.len();
        if n == 0 || n_features == 0 || x.len() != n * n_features {
            return Err(SearchError::Evaluation(format!(
                "cannot train on {} values for {} samples of {} features",
                x.len(),
                n,
                n_features
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(config.seed);

        let mut sizes = vec![n_features];
        sizes.extend(config.hidden_layers.iter().copied());
        sizes.push(1);
        let mut layers: Vec<Layer> = sizes
            .windows(2)
            .map(|w| Layer::new(w[0], w[1], &mut rng))
            .collect();
        let mut moments: Vec<Moments> = layers.iter().map(Moments::new).collect();

        let x_scaler = Standardizer::fit(x, n_features);
        let xs = x_scaler.transform(x);
        let y_mean = y.iter().sum::<f64>() / n as f64;
        let y_var = y.iter().map(|v| (v - y_mean).powi(2)).sum::<f64>() / n as f64;
        let y_scale = if y_var > 0.0 { y_var.sqrt() } else { 1.0 };
        let ys: Vec<f64> = y.iter().map(|v| (v - y_mean) / y_scale).collect();

        let batch_size = config.batch_size.min(n);
        let mut indices: Vec<usize> = (0..n).collect();

        // Buffers reused across samples
        let mut activations: Vec<Vec<f64>> = sizes.iter().map(|&s| vec![0.0; s]).collect();
        let mut deltas: Vec<Vec<f64>> = sizes.iter().map(|&s| vec![0.0; s]).collect();
        let mut grad_weights: Vec<Vec<f64>> = layers.iter().map(|l| vec![0.0; l.weights.len()]).collect();
        let mut grad_bias: Vec<Vec<f64>> = layers.iter().map(|l| vec![0.0; l.bias.len()]).collect();

        let last = layers.len() - 1;
        let mut step: i32 = 0;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut n_iter = 0;
        let mut epoch_loss = f64::INFINITY;

        for _epoch in 0..config.max_iter {
            indices.shuffle(&mut rng);
            let mut accumulated = 0.0;

            for batch in indices.chunks(batch_size) {
                grad_weights.iter_mut().for_each(|g| g.iter_mut().for_each(|v| *v = 0.0));
                grad_bias.iter_mut().for_each(|g| g.iter_mut().for_each(|v| *v = 0.0));

                for &i in batch {
                    activations[0].copy_from_slice(&xs[i * n_features..(i + 1) * n_features]);
                    for l in 0..layers.len() {
                        let (input, output) = activations.split_at_mut(l + 1);
                        layers[l].forward(&input[l], &mut output[0], l < last);
                    }

                    let error = activations[last + 1][0] - ys[i];
                    accumulated += 0.5 * error * error;
                    deltas[last + 1][0] = error;

                    for l in (0..layers.len()).rev() {
                        let layer = &layers[l];
                        for o in 0..layer.n_out {
                            let d = deltas[l + 1][o];
                            grad_bias[l][o] += d;
                            let row = &mut grad_weights[l][o * layer.n_in..(o + 1) * layer.n_in];
                            for (g, a) in row.iter_mut().zip(&activations[l]) {
                                *g += d * a;
                            }
                        }
                        if l > 0 {
                            for j in 0..layer.n_in {
                                let back: f64 = (0..layer.n_out)
                                    .map(|o| layer.weights[o * layer.n_in + j] * deltas[l + 1][o])
                                    .sum();
                                // ReLU derivative
                                deltas[l][j] = if activations[l][j] > 0.0 { back } else { 0.0 };
                            }
                        }
                    }
                }

                let b = batch.len() as f64;
                let penalty: f64 = layers
                    .iter()
                    .map(|l| l.weights.iter().map(|w| w * w).sum::<f64>())
                    .sum();
                accumulated += 0.5 * config.alpha * penalty * b / n as f64;

                step += 1;
                let correction = (1.0 - BETA_2.powi(step)).sqrt() / (1.0 - BETA_1.powi(step));
                let lr = config.learning_rate * correction;

                for l in 0..layers.len() {
                    for (g, w) in grad_weights[l].iter_mut().zip(&layers[l].weights) {
                        *g = (*g + config.alpha * w) / b;
                    }
                    grad_bias[l].iter_mut().for_each(|g| *g /= b);

                    let layer = &mut layers[l];
                    let moment = &mut moments[l];
                    adam_step(&mut layer.weights, &grad_weights[l], &mut moment.m_weights, &mut moment.v_weights, lr);
                    adam_step(&mut layer.bias, &grad_bias[l], &mut moment.m_bias, &mut moment.v_bias, lr);
                }
            }

            n_iter += 1;
            epoch_loss = accumulated / n as f64;

            if !epoch_loss.is_finite() {
                return Err(SearchError::Evaluation(format!(
                    "training diverged at epoch {} (hidden layers {:?}, learning rate {:e})",
                    n_iter, config.hidden_layers, config.learning_rate
                )));
            }

            if epoch_loss > best_loss - config.tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            if epoch_loss < best_loss {
                best_loss = epoch_loss;
            }
            if no_improvement > config.n_iter_no_change {
                break;
            }
        }

        Ok(MlpRegressor {
            layers,
            x_scaler,
            y_mean,
            y_scale,
            n_iter,
            loss: epoch_loss,
        })
    }

    pub fn n_features(&self) -> usize {
        self.x_scaler.mean.len()
    }

    /// Predict the target of each row of `x`.
    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        let n_features = self.n_features();
        let xs = self.x_scaler.transform(x);
        let last = self.layers.len() - 1;

        let mut activations: Vec<Vec<f64>> = std::iter::once(n_features)
            .chain(self.layers.iter().map(|l| l.n_out))
            .map(|s| vec![0.0; s])
            .collect();

        xs.chunks(n_features)
            .map(|row| {
                activations[0].copy_from_slice(row);
                for l in 0..self.layers.len() {
                    let (input, output) = activations.split_at_mut(l + 1);
                    self.layers[l].forward(&input[l], &mut output[0], l < last);
                }
                activations[last + 1][0] * self.y_scale + self.y_mean
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_problem(n: usize) -> (Vec<f64>, Vec<f64>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..n {
            let a = (i % 10) as f64;
            let b = ((i * 7) % 13) as f64;
            x.push(a);
            x.push(b);
            y.push(3.0 * a - 2.0 * b + 1.0);
        }
        (x, y)
    }

    fn config(hidden: Vec<usize>, max_iter: usize) -> MlpConfig {
        let mut cv = param::CV::default();
        cv.max_iter = max_iter;
        MlpConfig::new(hidden, &cv).with_learning_rate(0.01)
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = linear_problem(80);
        let c = config(vec![8, 4], 30);
        let m1 = MlpRegressor::fit(&c, &x, 2, &y).unwrap();
        let m2 = MlpRegressor::fit(&c, &x, 2, &y).unwrap();
        let p1 = m1.predict(&x);
        let p2 = m2.predict(&x);
        assert_eq!(p1.len(), 80);
        for (a, b) in p1.iter().zip(&p2) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_fit_learns_a_linear_relation() {
        let (x, y) = linear_problem(120);
        let mut c = config(vec![16], 300);
        c.batch_size = 20;
        let model = MlpRegressor::fit(&c, &x, 2, &y).unwrap();
        let pred = model.predict(&x);
        let mae_model = pred.iter().zip(&y).map(|(p, t)| (p - t).abs()).sum::<f64>() / y.len() as f64;

        let mean = y.iter().sum::<f64>() / y.len() as f64;
        let mae_mean = y.iter().map(|t| (t - mean).abs()).sum::<f64>() / y.len() as f64;
        assert!(
            mae_model < mae_mean * 0.5,
            "model MAE {} should beat the constant predictor {}",
            mae_model,
            mae_mean
        );
    }

    #[test]
    fn test_seed_changes_the_model() {
        let (x, y) = linear_problem(50);
        let c1 = config(vec![8], 5);
        let mut c2 = c1.clone();
        c2.seed = 1;
        let p1 = MlpRegressor::fit(&c1, &x, 2, &y).unwrap().predict(&x);
        let p2 = MlpRegressor::fit(&c2, &x, 2, &y).unwrap().predict(&x);
        assert_ne!(p1, p2);
    }

    #[test]
    fn test_invalid_configuration_is_an_error() {
        let (x, y) = linear_problem(10);
        let bad_width = config(vec![8, 0], 5);
        assert!(matches!(
            MlpRegressor::fit(&bad_width, &x, 2, &y),
            Err(SearchError::Evaluation(_))
        ));
        let bad_lr = config(vec![8], 5).with_learning_rate(-1.0);
        assert!(MlpRegressor::fit(&bad_lr, &x, 2, &y).is_err());
    }

    #[test]
    fn test_shape_mismatch_is_an_error() {
        let c = config(vec![4], 5);
        assert!(MlpRegressor::fit(&c, &[1.0, 2.0, 3.0], 2, &[1.0, 2.0]).is_err());
    }

    #[test]
    fn test_constant_target_is_predicted() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y = vec![5.0; 20];
        let model = MlpRegressor::fit(&config(vec![4], 200), &x, 1, &y).unwrap();
        for p in model.predict(&x) {
            assert!((p - 5.0).abs() < 1.0);
        }
    }

    #[test]
    fn test_training_stops_early_when_loss_plateaus() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y = vec![5.0; 20];
        let mut c = config(vec![4], 500);
        c.tol = 1.0;
        let model = MlpRegressor::fit(&c, &x, 1, &y).unwrap();
        assert!(model.n_iter < 500);
        assert!(model.loss.is_finite() && model.loss >= 0.0);
    }
}
