//! Per-timestep output for one observed node.
//!
//! Three plain-text files, one line per timestep, suitable for Gnuplot or
//! Octave:
//!
//! | File                                   | Line                        |
//! |----------------------------------------|-----------------------------|
//! | `<prefix>.taus[.<run>]`                | `<id> <tau>...`             |
//! | `<prefix>.node_utilities[.<run>]`      | `<id> <total utility>...`   |
//! | `<prefix>.conjoint_utilities[.<run>]`  | `<cumulative conjoint>`     |

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use super::Simulator;
use crate::error::{Result, SimError};
use crate::node::NodeId;

/// Paths of the taus, node utilities and conjoint utilities files
pub fn output_paths(prefix: &str, run_id: Option<&str>) -> [PathBuf; 3] {
    let suffix = run_id.map(|id| format!(".{id}")).unwrap_or_default();
    [
        PathBuf::from(format!("{prefix}.taus{suffix}")),
        PathBuf::from(format!("{prefix}.node_utilities{suffix}")),
        PathBuf::from(format!("{prefix}.conjoint_utilities{suffix}")),
    ]
}

/// Writes the state of one node after every timestep
pub struct Recorder<W: Write = BufWriter<File>> {
    node: NodeId,
    taus: W,
    node_utilities: W,
    conjoint_utilities: W,
}

impl Recorder {
    /// Create (truncate) the three output files
    pub fn create(prefix: &str, run_id: Option<&str>, node: NodeId) -> Result<Self> {
        let [taus, node_utilities, conjoint_utilities] = output_paths(prefix, run_id);
        tracing::debug!(path = %taus.display(), node = %node, "recording node state");

        Ok(Self::new(
            node,
            BufWriter::new(File::create(taus)?),
            BufWriter::new(File::create(node_utilities)?),
            BufWriter::new(File::create(conjoint_utilities)?),
        ))
    }
}

impl<W: Write> Recorder<W> {
    /// Record into arbitrary sinks
    pub fn new(node: NodeId, taus: W, node_utilities: W, conjoint_utilities: W) -> Self {
        Self {
            node,
            taus,
            node_utilities,
            conjoint_utilities,
        }
    }

    /// Observed node
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Append one line to each sink
    pub fn record(&mut self, sim: &Simulator) -> Result<()> {
        let node = sim.node(self.node).ok_or(SimError::UnknownNode(self.node))?;
        node.write_taus(&mut self.taus)?;
        node.write_total_utilities(&mut self.node_utilities)?;
        node.write_cumulative_conjoint_utility(&mut self.conjoint_utilities)?;
        Ok(())
    }

    /// Flush all sinks
    pub fn flush(&mut self) -> Result<()> {
        self.taus.flush()?;
        self.node_utilities.flush()?;
        self.conjoint_utilities.flush()?;
        Ok(())
    }

    /// Give back the sinks
    pub fn into_inner(self) -> (W, W, W) {
        (self.taus, self.node_utilities, self.conjoint_utilities)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::sim::{EdgeTable, EventSchedule};

    #[test]
    fn test_output_paths() {
        let [taus, utilities, conjoint] = output_paths("out/run", Some("7"));
        assert_eq!(taus, PathBuf::from("out/run.taus.7"));
        assert_eq!(utilities, PathBuf::from("out/run.node_utilities.7"));
        assert_eq!(conjoint, PathBuf::from("out/run.conjoint_utilities.7"));

        let [taus, _, _] = output_paths("x", None);
        assert_eq!(taus, PathBuf::from("x.taus"));
    }

    #[test]
    fn test_records_one_line_per_step() {
        let mut sim =
            Simulator::new(3, EdgeTable::new(), EventSchedule::new(), &BTreeMap::new(), 1)
                .unwrap();
        let mut recorder = Recorder::new(NodeId(0), Vec::new(), Vec::new(), Vec::new());

        sim.run_with(4, |s| recorder.record(s)).unwrap();

        let (taus, utilities, conjoint) = recorder.into_inner();
        let taus = String::from_utf8(taus).unwrap();
        assert_eq!(taus.lines().count(), 4);
        assert!(taus.lines().all(|line| line.starts_with("0 ")));
        assert_eq!(taus.lines().next().unwrap().split(' ').count(), 3);
        assert_eq!(String::from_utf8(utilities).unwrap().lines().count(), 4);
        assert_eq!(String::from_utf8(conjoint).unwrap().lines().count(), 4);
    }

    #[test]
    fn test_unknown_observed_node() {
        let sim = Simulator::new(2, EdgeTable::new(), EventSchedule::new(), &BTreeMap::new(), 1)
            .unwrap();
        let mut recorder = Recorder::new(NodeId(9), Vec::new(), Vec::new(), Vec::new());
        assert!(matches!(
            recorder.record(&sim),
            Err(SimError::UnknownNode(NodeId(9)))
        ));
    }

    #[test]
    fn test_create_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("scenario");
        let prefix = prefix.to_str().unwrap();

        let mut sim =
            Simulator::new(2, EdgeTable::new(), EventSchedule::new(), &BTreeMap::new(), 1)
                .unwrap();
        let mut recorder = Recorder::create(prefix, Some("1"), NodeId(0)).unwrap();
        sim.run_with(3, |s| recorder.record(s)).unwrap();
        recorder.flush().unwrap();

        let [taus, _, conjoint] = output_paths(prefix, Some("1"));
        assert_eq!(std::fs::read_to_string(taus).unwrap().lines().count(), 3);
        assert_eq!(std::fs::read_to_string(conjoint).unwrap().lines().count(), 3);
    }
}
