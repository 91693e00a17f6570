use crate::ratings::SparseRatingMatrix;
use crate::Flt;

/// Per-row views of the observed ratings used by the ALS solves.
///
/// `items_per_user[n]` lists `(item, rating)` for every item user `n` rated,
/// `users_per_item[d]` lists `(user, rating)` for every user who rated item
/// `d`. Both lists are sorted by index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexGroups {
    pub items_per_user: Vec<Vec<(usize, Flt)>>,
    pub users_per_item: Vec<Vec<(usize, Flt)>>,
}

impl IndexGroups {
    pub fn build(ratings: &SparseRatingMatrix) -> IndexGroups {
        let users_per_item = ratings
            .csr()
            .row_iter()
            .map(|row| {
                row.col_indices()
                    .iter()
                    .copied()
                    .zip(row.values().iter().copied())
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        let mut items_per_user = vec![Vec::new(); ratings.no_users()];
        // row-major walk keeps each user's items ascending
        ratings
            .triplets()
            .for_each(|(d, n, v)| items_per_user[n].push((d, v)));

        IndexGroups {
            items_per_user,
            users_per_item,
        }
    }

    pub fn nnz(&self) -> usize {
        self.users_per_item.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_groups_match_nonzero_set() {
        let ratings = SparseRatingMatrix::from_dense(&array![
            [5.0, 0.0, 3.0],
            [0.0, 2.0, 1.0],
            [0.0, 0.0, 0.0],
        ])
        .unwrap();
        let groups = IndexGroups::build(&ratings);

        assert_eq!(groups.users_per_item[0], vec![(0, 5.0), (2, 3.0)]);
        assert_eq!(groups.users_per_item[1], vec![(1, 2.0), (2, 1.0)]);
        assert!(groups.users_per_item[2].is_empty());

        assert_eq!(groups.items_per_user[0], vec![(0, 5.0)]);
        assert_eq!(groups.items_per_user[1], vec![(1, 2.0)]);
        assert_eq!(groups.items_per_user[2], vec![(0, 3.0), (1, 1.0)]);

        assert_eq!(groups.nnz(), ratings.nnz());
    }
}
