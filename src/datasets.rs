use std::path::Path;

use polars::prelude::{CsvReader, DataType, SerReader};
use tracing::debug;

use crate::error::{FactorizeError, Result};
use crate::ratings::SparseRatingMatrix;
use crate::Flt;

/// Layout of a `user, item, rating` file. Extra trailing columns are ignored.
#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub separator: u8,
    pub has_header: bool,
    /// Ids in the file start at 1 rather than 0.
    pub one_based: bool,
}

impl Default for CsvOptions {
    fn default() -> CsvOptions {
        CsvOptions {
            separator: b',',
            has_header: true,
            one_based: false,
        }
    }
}

impl CsvOptions {
    /// MovieLens `u.data` style: tab separated, no header, 1-based ids.
    pub fn movielens() -> CsvOptions {
        CsvOptions {
            separator: b'\t',
            has_header: false,
            one_based: true,
        }
    }
}

/// Reads rating triplets into an `items × users` matrix sized by the largest ids seen.
pub fn load_ratings<P: AsRef<Path>>(path: P, options: &CsvOptions) -> Result<SparseRatingMatrix> {
    let data_type = vec![DataType::UInt32, DataType::UInt32, DataType::Float64];
    let df = CsvReader::from_path(path.as_ref().to_path_buf())?
        .with_separator(options.separator)
        .has_header(options.has_header)
        .with_projection(Some(vec![0, 1, 2]))
        .with_dtypes_slice(Some(data_type.as_slice()))
        .finish()?;

    let offset = if options.one_based { 1 } else { 0 };
    let mut users = Vec::with_capacity(df.height());
    let mut items = Vec::with_capacity(df.height());
    let mut values = Vec::with_capacity(df.height());
    for (row, ((user, item), rating)) in df[0]
        .u32()?
        .into_iter()
        .zip(df[1].u32()?.into_iter())
        .zip(df[2].f64()?.into_iter())
        .enumerate()
    {
        let (user, item, rating) = match (user, item, rating) {
            (Some(user), Some(item), Some(rating)) => (user as usize, item as usize, rating),
            _ => return Err(FactorizeError::Dataset(format!("missing value in row {}", row))),
        };
        if user < offset || item < offset {
            return Err(FactorizeError::Dataset(format!(
                "id 0 in row {} of a 1-based file",
                row
            )));
        }
        users.push(user - offset);
        items.push(item - offset);
        values.push(rating as Flt);
    }

    let no_users = users.iter().max().map_or(0, |m| m + 1);
    let no_items = items.iter().max().map_or(0, |m| m + 1);
    debug!(
        "loaded {} ratings for {} items and {} users",
        values.len(),
        no_items,
        no_users
    );
    SparseRatingMatrix::from_triplets(no_items, no_users, items, users, values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_ratings_with_header() {
        let file = write_temp("user,item,rating\n0,1,4.0\n2,0,3.5\n1,1,5\n");
        let ratings = load_ratings(file.path(), &CsvOptions::default()).unwrap();

        assert_eq!(ratings.shape(), (2, 3));
        assert_eq!(ratings.nnz(), 3);
        assert_eq!(ratings.get(1, 0), 4.0);
        assert_eq!(ratings.get(0, 2), 3.5);
        assert_eq!(ratings.get(1, 1), 5.0);
    }

    #[test]
    fn test_load_movielens_layout() {
        let file = write_temp("1\t2\t3\t881250949\n2\t1\t4\t891717742\n");
        let ratings = load_ratings(file.path(), &CsvOptions::movielens()).unwrap();

        assert_eq!(ratings.shape(), (2, 2));
        assert_eq!(ratings.get(1, 0), 3.0);
        assert_eq!(ratings.get(0, 1), 4.0);
    }

    #[test]
    fn test_zero_id_in_one_based_file_is_an_error() {
        let file = write_temp("0\t1\t3\t881250949\n");
        assert!(matches!(
            load_ratings(file.path(), &CsvOptions::movielens()),
            Err(FactorizeError::Dataset(_))
        ));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("ratings.csv");
        assert!(load_ratings(missing, &CsvOptions::default()).is_err());
    }
}
