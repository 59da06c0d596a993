use std::collections::BTreeSet;

/// Row ids present in every list. Duplicates collapse and the result comes
/// back in ascending order; no lists at all yields an empty set.
pub fn intersect_row_ids(row_id_lists: impl IntoIterator<Item = Vec<i64>>) -> BTreeSet<i64> {
    let mut lists = row_id_lists.into_iter();
    let Some(first) = lists.next() else {
        return BTreeSet::new();
    };

    let mut surviving: BTreeSet<i64> = first.into_iter().collect();
    for list in lists {
        if surviving.is_empty() {
            break;
        }
        let other: BTreeSet<i64> = list.into_iter().collect();
        surviving.retain(|row_id| other.contains(row_id));
    }
    surviving
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn single_list_is_deduplicated_and_sorted() {
        let ids = intersect_row_ids(vec![vec![9, 2, 9, 4]]);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![2, 4, 9]);
    }

    #[test]
    fn intersection_of_several_lists() {
        let ids = intersect_row_ids(vec![vec![1, 2, 3, 5, 8], vec![8, 3, 1], vec![3, 8, 13]]);
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![3, 8]);
    }

    #[test]
    fn disjoint_and_empty_inputs() {
        assert!(intersect_row_ids(vec![vec![1], vec![2]]).is_empty());
        assert!(intersect_row_ids(Vec::<Vec<i64>>::new()).is_empty());
    }
}
