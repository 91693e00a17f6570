extern crate rightmf;

use ndarray::Array2;
use ndarray_rand::RandomExt;
use rand::distributions::Uniform;
use rand::{Rng, SeedableRng};
use rand_isaac::Isaac64Rng;
use rightmf::{random_train_test_split, Als, AlsParams, Sgd, SgdParams, SparseRatingMatrix};

fn main() {
    let mut rng = Isaac64Rng::seed_from_u64(3);
    let items = Array2::random_using((40, 3), Uniform::new(0.5, 1.5), &mut rng);
    let users = Array2::random_using((60, 3), Uniform::new(0.5, 1.5), &mut rng);
    let mut dense = items.dot(&users.t());
    dense.mapv_inplace(|v| if rng.gen_bool(0.3) { v } else { 0.0 });

    let ratings = SparseRatingMatrix::from_dense(&dense).unwrap();
    let (train, test) = random_train_test_split(&ratings, 0.1, 988).unwrap();
    println!("train ratings:{}, test ratings:{}", train.nnz(), test.nnz());

    let als = Als::new(AlsParams::new(3, 0.1, 0.1))
        .unwrap()
        .fit(&train, Some(&test))
        .unwrap();
    println!("ALS iterations:{}, test rmse:{:?}", als.iterations, als.test_rmse);

    let sgd = Sgd::new(SgdParams::new(0.05, 3, 0.01, 0.01))
        .unwrap()
        .fit(&train, Some(&test))
        .unwrap();
    println!("SGD test rmse:{}", sgd.test_rmse);
}
