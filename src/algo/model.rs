use burn::{prelude::*, tensor::activation::relu};
use nn::{Linear, LinearConfig};

/// A small fully connected action-value estimator
#[derive(Module, Debug)]
pub struct QNet<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
}

#[derive(Config, Debug)]
pub struct QNetConfig {
    input: usize,
    output: usize,
    #[config(default = 128)]
    hidden: usize,
}

impl QNetConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> QNet<B> {
        QNet {
            fc1: LinearConfig::new(self.input, self.hidden).init(device),
            fc2: LinearConfig::new(self.hidden, self.hidden).init(device),
            fc3: LinearConfig::new(self.hidden, self.output).init(device),
        }
    }
}

impl<B: Backend> QNet<B> {
    /// In shape: `[batch, input]`
    ///
    /// Out shape: `[batch, output]`
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = relu(self.fc1.forward(input));
        let x = relu(self.fc2.forward(x));
        self.fc3.forward(x)
    }
}
