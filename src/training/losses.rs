//! Loss functions for the supported GAN objectives
//!
//! Binary cross-entropy on logits for the standard objective, Wasserstein
//! critic losses with gradient penalty for the wgan-gp variant, and
//! categorical cross-entropy for the auxiliary classification heads.

use tch::{Kind, Reduction, Tensor};

use crate::model::{DiscInput, Discriminator};

/// Generator loss: -log(D(G(z)))
///
/// The generator wants the discriminator to output 1 (real) for fakes.
pub fn generator_loss(fake_output: &Tensor) -> Tensor {
    let targets = Tensor::ones_like(fake_output);
    fake_output.binary_cross_entropy_with_logits::<Tensor>(&targets, None, None, Reduction::Mean)
}

/// Discriminator loss on real samples: -log(D(x))
pub fn discriminator_real_loss(real_output: &Tensor) -> Tensor {
    let targets = Tensor::ones_like(real_output);
    real_output.binary_cross_entropy_with_logits::<Tensor>(&targets, None, None, Reduction::Mean)
}

/// Discriminator loss on fake samples: -log(1 - D(G(z)))
pub fn discriminator_fake_loss(fake_output: &Tensor) -> Tensor {
    let targets = Tensor::zeros_like(fake_output);
    fake_output.binary_cross_entropy_with_logits::<Tensor>(&targets, None, None, Reduction::Mean)
}

/// Wasserstein generator loss: -E[D(G(z))]
pub fn generator_loss_wasserstein(fake_output: &Tensor) -> Tensor {
    -fake_output.mean(Kind::Float)
}

/// Wasserstein critic loss on real samples: -E[D(x)]
pub fn critic_real_loss(real_output: &Tensor) -> Tensor {
    -real_output.mean(Kind::Float)
}

/// Wasserstein critic loss on fake samples: E[D(G(z))]
pub fn critic_fake_loss(fake_output: &Tensor) -> Tensor {
    fake_output.mean(Kind::Float)
}

/// Gradient penalty on real/fake interpolates
///
/// Samples a uniform interpolation point per example, runs the critic on
/// it with gradients enabled and penalizes the squared distance of the
/// gradient norm from 1. `domain_b` selects which branch of the coupled
/// critic evaluates the interpolates.
pub fn gradient_penalty(
    discriminator: &Discriminator,
    real: &Tensor,
    fake: &Tensor,
    cond: Option<&Tensor>,
    domain_b: bool,
    weight: f64,
) -> Tensor {
    let batch_size = real.size()[0];
    let eps = Tensor::rand([batch_size, 1, 1, 1], (Kind::Float, real.device()));

    let interpolated =
        (real * &eps + fake * &(Tensor::ones_like(&eps) - &eps)).set_requires_grad(true);

    let out = if domain_b {
        discriminator.forward(DiscInput::B {
            x: &interpolated,
            c: cond,
        })
    } else {
        discriminator.forward(DiscInput::A {
            x: &interpolated,
            c: cond,
        })
    };
    let src = match (&out.a, &out.b) {
        (Some(domain), _) => &domain.src,
        (_, Some(domain)) => &domain.src,
        _ => unreachable!("a forward pass always produces at least one branch"),
    };

    let grads = Tensor::run_backward(&[src.sum(Kind::Float)], &[&interpolated], true, true);
    let grad_norm = grads[0]
        .view([batch_size, -1])
        .square()
        .sum_dim_intlist([1i64].as_slice(), false, Kind::Float)
        .sqrt();

    (grad_norm - 1.0).square().mean(Kind::Float) * weight
}

/// Categorical cross-entropy summed over the auxiliary heads
///
/// `class_logits` holds one (n, categories[i]) tensor per head; `labels`
/// has shape (n,) for a single head or (n, heads).
pub fn auxiliary_class_loss(class_logits: &[Tensor], labels: &Tensor) -> Tensor {
    let labels = if labels.dim() == 1 {
        labels.unsqueeze(1)
    } else {
        labels.shallow_clone()
    };

    let mut total = Tensor::from(0f32).to_device(class_logits[0].device());
    for (head, logits) in class_logits.iter().enumerate() {
        let target = labels.select(1, head as i64).to_device(logits.device());
        total = total + logits.cross_entropy_for_logits(&target);
    }
    total
}
