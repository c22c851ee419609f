/// Turn per-event boundary flags into zero-based session indices.
///
/// The index is a running count of `true` flags, minus one, with the first
/// event pinned to 0 whatever its flag says. Indices never decrease and every
/// `true` after the first event opens exactly one new index.
pub fn assign_indices(flags: &[bool]) -> Vec<u64> {
    flags
        .iter()
        .scan(None::<u64>, |counter, &new_session| {
            let index = match *counter {
                None => 0,
                Some(current) if new_session => current + 1,
                Some(current) => current,
            };
            *counter = Some(index);
            Some(index)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_are_a_prefix_count_of_boundaries() {
        assert_eq!(
            assign_indices(&[true, false, true, false]),
            vec![0, 0, 1, 1]
        );
        assert_eq!(assign_indices(&[true, true]), vec![0, 1]);
        assert_eq!(
            assign_indices(&[true, true, false, false, true]),
            vec![0, 1, 1, 1, 2]
        );
    }

    #[test]
    fn first_event_is_index_zero() {
        assert_eq!(assign_indices(&[true]), vec![0]);
        assert_eq!(assign_indices(&[false, false, true]), vec![0, 0, 1]);
    }

    #[test]
    fn empty_flags_have_no_indices() {
        assert!(assign_indices(&[]).is_empty());
    }
}
