/// Compressed sparse row adjacency: row `i` owns `col_index[row_index[i]..row_index[i + 1]]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Csr {
    pub row_index: Vec<u32>,
    pub col_index: Vec<u32>,
    pub values: Vec<u32>,
}

impl Csr {
    pub fn is_empty(&self) -> bool {
        self.row_index.is_empty() && self.col_index.is_empty() && self.values.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.row_index.len().saturating_sub(1)
    }

    /// `(destination, weight)` pairs of one node; empty for unknown nodes.
    pub fn neighbors(&self, node: usize) -> impl Iterator<Item = (u32, u32)> + '_ {
        let edges = self.col_index.len().min(self.values.len());
        let range = match (self.row_index.get(node), self.row_index.get(node + 1)) {
            (Some(&start), Some(&end)) if start <= end => {
                (start as usize).min(edges)..(end as usize).min(edges)
            }
            _ => 0..0,
        };
        self.col_index[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    pub fn validate(&self) -> Result<(), String> {
        let Some(&first) = self.row_index.first() else {
            return Err("row_index is empty".to_string());
        };
        if first != 0 {
            return Err(format!("row_index starts at {first}, not 0"));
        }
        if let Some(i) = self.row_index.windows(2).position(|w| w[0] > w[1]) {
            return Err(format!("row_index decreases after entry {i}"));
        }

        let edges = self.row_index[self.row_index.len() - 1] as usize;
        if self.col_index.len() != edges {
            return Err(format!(
                "col_index has {} entries, row_index ends at {edges}",
                self.col_index.len()
            ));
        }
        if self.values.len() != edges {
            return Err(format!(
                "values has {} entries, row_index ends at {edges}",
                self.values.len()
            ));
        }
        Ok(())
    }

    /// Edges whose destination has no row of its own: `(edge, destination)`.
    pub fn dangling(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        let nodes = self.node_count();
        self.col_index
            .iter()
            .copied()
            .enumerate()
            .filter(move |(_, dest)| *dest as usize >= nodes)
    }

    /// Non-zero entries of a square weight matrix become edges.
    pub fn from_adjacency(matrix: &[Vec<i32>]) -> Result<Self, String> {
        let n = matrix.len();
        let mut csr = Csr::default();
        for (i, row) in matrix.iter().enumerate() {
            if row.len() != n {
                return Err(format!("row {i} has {} columns, expected {n}", row.len()));
            }
            csr.row_index.push(csr.col_index.len() as u32);
            for (j, weight) in row.iter().enumerate() {
                if *weight != 0 {
                    csr.col_index.push(j as u32);
                    csr.values.push(*weight as u32);
                }
            }
        }
        csr.row_index.push(csr.col_index.len() as u32);
        Ok(csr)
    }

    /// Renders the three graph directives.
    pub fn to_source(&self) -> String {
        fn join<T: ToString>(items: impl Iterator<Item = T>) -> String {
            items.map(|x| x.to_string()).collect::<Vec<_>>().join(", ")
        }
        format!(
            ".row_index\n{}\n\n.col_index\n{}\n\n.values\n{}\n",
            join(self.row_index.iter()),
            join(self.col_index.iter()),
            join(self.values.iter().map(|v| *v as i32)),
        )
    }
}
