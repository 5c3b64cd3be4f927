use std::{fs, io, path::Path};

use math::Vector;

/// A replayable stream of training instances. An instance is one numeric
/// vector whose leading slots are features and trailing slots are targets;
/// the consumer decides where the split is. End of input is an ordinary
/// condition answered with [`reopen`](RecordSource::reopen), never a
/// termination signal.
pub trait RecordSource {
    /// The next instance, or `None` at end of input.
    fn read_next(&mut self) -> Option<Vector>;

    /// Rewinds to the first instance.
    fn reopen(&mut self);
}

/// An in-memory record source.
#[derive(Debug, Clone)]
pub struct MemorySource {
    instances: Vec<Vector>,
    position: usize,
}

impl MemorySource {
    pub fn new(instances: Vec<Vector>) -> Self {
        Self {
            instances,
            position: 0,
        }
    }

    /// Loads a comma-separated numeric file, one instance per line. Blank
    /// lines and lines starting with `#` are skipped.
    pub fn from_csv(path: impl AsRef<Path>) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut instances = Vec::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let values = line
                .split(',')
                .map(|field| field.trim().parse::<f64>())
                .collect::<Result<Vec<f64>, _>>()
                .map_err(|e| {
                    io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("line {}: {e}", number + 1),
                    )
                })?;
            instances.push(Vector::from(values));
        }
        Ok(Self::new(instances))
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl RecordSource for MemorySource {
    fn read_next(&mut self) -> Option<Vector> {
        let instance = self.instances.get(self.position)?.clone();
        self.position += 1;
        Some(instance)
    }

    fn reopen(&mut self) {
        self.position = 0;
    }
}
