use indexmap::IndexMap;

/// Code labels in definition order: name -> (defining line, pc).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Labels {
    labels: IndexMap<String, (usize, u32)>,
}

impl Labels {
    pub fn new() -> Self {
        Labels {
            labels: IndexMap::new(),
        }
    }

    /// Keeps the first definition; a clash returns it instead of overwriting.
    pub fn insert(&mut self, name: &str, line: usize, pc: u32) -> Option<(usize, u32)> {
        match self.labels.get(name) {
            Some(prev) => Some(*prev),
            None => {
                self.labels.insert(name.to_string(), (line, pc));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<(usize, u32)> {
        self.labels.get(name).copied()
    }

    pub fn get_pc(&self, name: &str) -> Option<u32> {
        self.labels.get(name).map(|(_, pc)| *pc)
    }

    /// Labels defined exactly at `pc`, for listings.
    pub fn at(&self, pc: u32) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .filter(move |(_, (_, at))| *at == pc)
            .map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.labels.iter().map(|(name, (_, pc))| (name.as_str(), *pc))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
