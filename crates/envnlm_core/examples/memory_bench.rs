use envnlm_core::{
    add_gaussian_noise, normalize_0_1, Execution, NlmConfig, NlmDenoiser, ScalarField,
};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn parse_arg<T: std::str::FromStr>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse::<T>().ok())
        .unwrap_or(default)
}

/// Smooth periodic density with a few Gaussian blobs per cell.
fn build_density(n: usize) -> ScalarField<f32> {
    let centers = [
        [0.25f32, 0.25, 0.25],
        [0.75, 0.75, 0.25],
        [0.5, 0.25, 0.75],
    ];
    let inv = 1.0 / n as f32;
    ScalarField::from_fn((n, n, n), |u, v, w| {
        let p = [u as f32 * inv, v as f32 * inv, w as f32 * inv];
        centers
            .iter()
            .map(|c| {
                let d2: f32 = p
                    .iter()
                    .zip(c)
                    .map(|(a, b)| {
                        let d = (a - b).abs();
                        let d = d.min(1.0 - d);
                        d * d
                    })
                    .sum();
                (-d2 / 0.01).exp()
            })
            .sum()
    })
}

fn peak_rss_mb() -> Option<f64> {
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::getrusage(libc::RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    #[cfg(target_os = "macos")]
    {
        Some(usage.ru_maxrss as f64 / (1024.0 * 1024.0))
    }
    #[cfg(not(target_os = "macos"))]
    {
        Some(usage.ru_maxrss as f64 / 1024.0)
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    let size = parse_arg(&args, "--size", 16usize);
    let radius = parse_arg(&args, "--radius", 1.5f32);
    let threshold = parse_arg(&args, "--threshold", 0.1f32);
    let sigma = parse_arg(&args, "--sigma", 0.1f32);
    let tolerance = parse_arg(&args, "--tolerance", 1.0f32);
    let sequential = parse_arg(&args, "--sequential", false);

    println!(
        "memory bench start size={} radius={} threshold={} sigma={} tolerance={} sequential={} profile_env={:?}",
        size,
        radius,
        threshold,
        sigma,
        tolerance,
        sequential,
        std::env::var("ENVNLM_PROFILE_TIMING").ok()
    );

    let clean = normalize_0_1(&build_density(size));
    let noisy = add_gaussian_noise(&clean, sigma, 42).expect("noise injection failed");

    let config = NlmConfig::<f32> {
        radius,
        percentile_threshold: threshold,
        prefilter_tolerance: tolerance,
        execution: if sequential {
            Execution::Sequential
        } else {
            Execution::Parallel
        },
        ..NlmConfig::default()
    };
    let denoiser = NlmDenoiser::new(config).expect("invalid configuration");
    let footprint = denoiser.footprint(noisy.len());
    println!(
        "footprint table_mb={:.2} accumulators_mb={:.2} output_mb={:.2} neighbors_kb={:.2} total_mb={:.2} neighbors={}",
        footprint.table_bytes as f64 / 1e6,
        footprint.accumulator_bytes as f64 / 1e6,
        footprint.output_bytes as f64 / 1e6,
        footprint.neighbor_bytes as f64 / 1e3,
        footprint.total_bytes as f64 / 1e6,
        denoiser.neighbors().len()
    );

    let rss_before_mb = peak_rss_mb().unwrap_or(0.0);

    let t0 = Instant::now();
    let out = denoiser
        .build_table(&noisy)
        .expect("environment table build failed")
        .run();
    let elapsed = t0.elapsed();
    let rss_peak_mb = peak_rss_mb().unwrap_or(0.0);

    let rmse = |a: &ScalarField<f32>| -> f64 {
        let sq: f64 = a
            .as_slice()
            .iter()
            .zip(clean.as_slice())
            .map(|(&x, &y)| ((x - y) as f64).powi(2))
            .sum();
        (sq / a.len().max(1) as f64).sqrt()
    };

    let [mean, std, median, max, min] = out.diagnostics.monitoring_vector();
    println!(
        "memory bench done elapsed_s={:.3} rmse_noisy={:.5} rmse_denoised={:.5} hd={:.5} acceptance={:.4} pass_fraction=[mean {:.4} std {:.4} median {:.4} max {:.4} min {:.4}] rss_before_mb={:.1} rss_peak_mb={:.1}",
        elapsed.as_secs_f64(),
        rmse(&noisy),
        rmse(&out.denoised),
        out.diagnostics.bandwidth,
        out.diagnostics.acceptance_rate(),
        mean,
        std,
        median,
        max,
        min,
        rss_before_mb,
        rss_peak_mb
    );
}
