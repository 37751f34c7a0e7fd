/// Display ids handed to owning resources. Threaded through scenario
/// construction by `&mut` and only ever increases.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DisplayIds {
    last: u32,
}

impl DisplayIds {
    pub fn new() -> DisplayIds {
        DisplayIds::default()
    }

    pub fn next(&mut self) -> u32 {
        self.last += 1;
        self.last
    }

    pub fn last(&self) -> u32 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::DisplayIds;

    #[test]
    fn test_ids_increase() {
        let mut ids = DisplayIds::new();
        assert_eq!(ids.last(), 0);
        assert_eq!(ids.next(), 1);
        assert_eq!(ids.next(), 2);

        let snapshot = ids;
        ids.next();
        assert!(ids > snapshot);
    }
}
