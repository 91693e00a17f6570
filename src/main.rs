use anyhow::{bail, Context};
use rightmf::{
    best, load_ratings, random_train_test_split, run_search, sgd_grid, Algorithm, Als, AlsParams,
    CsvOptions, Flt, Sgd, SgdParams, DEFAULT_SEED, SEARCH_WORKERS,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str =
    "usage: rightmf <ratings.csv> [als|sgd|search] [k] [lambda_user] [lambda_item] [gamma]";
const TEST_PERCENTAGE: f64 = 0.1;

fn arg<T: std::str::FromStr>(args: &[String], idx: usize, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match args.get(idx) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("argument {} ({}): {}", idx, raw, e)),
        None => Ok(default),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = std::env::args().collect::<Vec<String>>();
    let Some(path) = args.get(1) else {
        bail!(USAGE);
    };
    let mode = args.get(2).map(String::as_str).unwrap_or("sgd");
    let k: usize = arg(&args, 3, 20)?;
    let lambda_user: Flt = arg(&args, 4, 0.1)?;
    let lambda_item: Flt = arg(&args, 5, 0.1)?;
    let gamma: Flt = arg(&args, 6, 0.05)?;

    let options = if path.ends_with(".data") {
        CsvOptions::movielens()
    } else {
        CsvOptions::default()
    };
    let ratings = load_ratings(path, &options).with_context(|| format!("loading {}", path))?;
    let (train, test) = random_train_test_split(&ratings, TEST_PERCENTAGE, DEFAULT_SEED)?;
    info!(
        "{} items x {} users, {} train / {} test ratings",
        ratings.no_items(),
        ratings.no_users(),
        train.nnz(),
        test.nnz()
    );

    if mode == "search" {
        let candidates = sgd_grid(
            &[gamma],
            &[(k / 2).max(1), k, k * 2],
            &[lambda_user],
            &[lambda_item],
        );
        let results = run_search(&train, &test, &candidates, SEARCH_WORKERS)?;
        match best(&results) {
            Some(result) => info!(
                "best configuration {:?}, test RMSE {:?}",
                result.params, result.test_rmse
            ),
            None => bail!("every search run failed"),
        }
        return Ok(());
    }

    match mode.parse::<Algorithm>().map_err(anyhow::Error::msg)? {
        Algorithm::Als => {
            let outcome =
                Als::new(AlsParams::new(k, lambda_user, lambda_item))?.fit(&train, Some(&test))?;
            info!(
                "ALS finished after {} iterations, test RMSE {:?}",
                outcome.iterations, outcome.test_rmse
            );
        }
        Algorithm::Sgd => {
            let params = SgdParams {
                verbose: true,
                ..SgdParams::new(gamma, k, lambda_user, lambda_item)
            };
            let outcome = Sgd::new(params)?.fit(&train, Some(&test))?;
            info!("SGD finished, test RMSE {}", outcome.test_rmse);
        }
    }
    Ok(())
}
