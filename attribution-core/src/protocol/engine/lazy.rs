use std::{
    collections::HashSet,
    sync::{Arc, Mutex, Weak},
};

use async_trait::async_trait;

use crate::{
    error::{Error, LengthError},
    helpers::{Role, Transport},
    protocol::{
        engine::{
            EngineSetup, SecureEngine, Session,
            beaver::{self, flatten},
            eager::{constant_share, open_shares, share_input},
            uniform_lanes,
        },
        prss::InsecureDealer,
    },
    secret_sharing::{Lanes, not_lanes, xor_lanes},
    telemetry::EngineStats,
};

/// Reference to a gate output inside the circuit recorded by a [`LazyEngine`]. The value of an
/// evaluated gate is kept only while some `Wire` to it, or some pending gate reading it, exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wire {
    id: Arc<usize>,
    lanes: usize,
}

impl Wire {
    fn id(&self) -> usize {
        *self.id
    }
}

#[derive(Debug)]
enum Gate {
    /// Value is this party's share, known at creation.
    Known,
    Xor(usize, usize),
    Not(usize),
    And(usize, usize),
}

#[derive(Debug, Default)]
struct Circuit {
    gates: Vec<Gate>,
    values: Vec<Option<Lanes>>,
    /// Number of AND gates on the longest path from an evaluated wire.
    depth: Vec<u32>,
    /// Every gate below this index has been evaluated.
    evaluated: usize,
    handles: Vec<Weak<usize>>,
}

impl Circuit {
    fn depth_of(&self, id: usize) -> u32 {
        if self.values[id].is_some() {
            0
        } else {
            self.depth[id]
        }
    }

    fn push(&mut self, gate: Gate, value: Option<Lanes>, depth: u32, lanes: usize) -> Wire {
        let id = Arc::new(self.gates.len());
        self.gates.push(gate);
        self.values.push(value);
        self.depth.push(depth);
        self.handles.push(Arc::downgrade(&id));
        Wire { id, lanes }
    }

    fn known(&mut self, share: Lanes) -> Wire {
        let lanes = share.len();
        self.push(Gate::Known, Some(share), 0, lanes)
    }

    /// Drops the values below `self.evaluated` that neither a live [`Wire`] nor a pending gate
    /// can read any more.
    fn release_unreachable(&mut self) {
        let pending_inputs = self.gates[self.evaluated..]
            .iter()
            .flat_map(|gate| match *gate {
                Gate::Known => [None, None],
                Gate::Not(a) => [Some(a), None],
                Gate::Xor(a, b) | Gate::And(a, b) => [Some(a), Some(b)],
            })
            .flatten()
            .collect::<HashSet<_>>();
        for id in 0..self.evaluated {
            if self.values[id].is_some()
                && self.handles[id].strong_count() == 0
                && !pending_inputs.contains(&id)
            {
                self.values[id] = None;
                self.handles[id] = Weak::new();
            }
        }
    }

    #[cfg(all(test, unit_test))]
    fn retained(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    fn value(&self, id: usize) -> &Lanes {
        self.values[id]
            .as_ref()
            .expect("inputs are evaluated before the gates that use them")
    }

    fn evaluate_local(&mut self, id: usize, role: Role) {
        let value = match self.gates[id] {
            Gate::Xor(a, b) => xor_lanes(self.value(a), self.value(b)),
            Gate::Not(a) if role == Role::Publisher => not_lanes(self.value(a)),
            Gate::Not(a) => self.value(a).clone(),
            Gate::Known | Gate::And(..) => return,
        };
        self.values[id] = Some(value);
    }
}

/// Two-party XOR-sharing engine that records gates and evaluates them only when a value leaves
/// the engine.
///
/// Evaluation processes pending gates level by level, where the level of a gate is its AND depth.
/// All AND gates of one level are multiplied with a single exchange, so the number of rounds is
/// the multiplicative depth of the pending circuit rather than the number of `multiply` calls.
pub struct LazyEngine {
    session: Session,
    dealer: InsecureDealer,
    circuit: Mutex<Circuit>,
    flushing: tokio::sync::Mutex<()>,
}

#[async_trait]
impl EngineSetup for LazyEngine {
    async fn setup(transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let session = Session::new(transport);
        let dealer = InsecureDealer::setup(&session).await?;
        Ok(Self {
            session,
            dealer,
            circuit: Mutex::new(Circuit::default()),
            flushing: tokio::sync::Mutex::new(()),
        })
    }
}

impl LazyEngine {
    fn known(&self, shares: Vec<Lanes>) -> Vec<Wire> {
        let mut circuit = self.circuit.lock().unwrap();
        shares.into_iter().map(|s| circuit.known(s)).collect()
    }

    /// Evaluates every pending gate.
    async fn flush(&self) -> Result<(), Error> {
        let _guard = self.flushing.lock().await;
        let role = self.session.role();
        let (start, end, max_depth) = {
            let circuit = self.circuit.lock().unwrap();
            let (start, end) = (circuit.evaluated, circuit.gates.len());
            let max_depth = circuit.depth[start..end].iter().copied().max();
            (start, end, max_depth)
        };
        let Some(max_depth) = max_depth else {
            return Ok(());
        };

        for level in 0..=max_depth {
            if level > 0 {
                let (x, y, outputs) = {
                    let circuit = self.circuit.lock().unwrap();
                    let mut x = Vec::new();
                    let mut y = Vec::new();
                    let mut outputs = Vec::new();
                    for id in start..end {
                        if let Gate::And(a, b) = circuit.gates[id] {
                            if circuit.depth[id] == level {
                                x.push(circuit.value(a).clone());
                                y.push(circuit.value(b).clone());
                                outputs.push((id, circuit.value(a).len()));
                            }
                        }
                    }
                    (flatten(&x), flatten(&y), outputs)
                };
                if !outputs.is_empty() {
                    tracing::trace!(
                        "{role:?} evaluates {} AND gates at depth {level}",
                        outputs.len()
                    );
                    let z = beaver::multiply(&self.session, &self.dealer, &[x], &[y]).await?;
                    let mut circuit = self.circuit.lock().unwrap();
                    let mut offset = 0;
                    for (id, lanes) in outputs {
                        circuit.values[id] = Some(z[0][offset..offset + lanes].to_bitvec());
                        offset += lanes;
                    }
                }
            }

            let mut circuit = self.circuit.lock().unwrap();
            for id in start..end {
                if circuit.depth[id] == level && circuit.values[id].is_none() {
                    circuit.evaluate_local(id, role);
                }
            }
        }

        let mut circuit = self.circuit.lock().unwrap();
        circuit.evaluated = end;
        circuit.release_unreachable();
        Ok(())
    }

    async fn evaluated(&self, values: &[Wire]) -> Result<Vec<Lanes>, Error> {
        self.flush().await?;
        let circuit = self.circuit.lock().unwrap();
        Ok(values.iter().map(|w| circuit.value(w.id()).clone()).collect())
    }
}

#[async_trait]
impl SecureEngine for LazyEngine {
    type Bit = Wire;

    fn role(&self) -> Role {
        self.session.role()
    }

    fn lanes(&self, bit: &Self::Bit) -> usize {
        bit.lanes
    }

    fn constant(&self, value: Lanes) -> Self::Bit {
        self.circuit
            .lock()
            .unwrap()
            .known(constant_share(self.role(), value))
    }

    fn xor(&self, a: &Self::Bit, b: &Self::Bit) -> Self::Bit {
        assert_eq!(a.lanes, b.lanes, "lane count mismatch");
        let mut circuit = self.circuit.lock().unwrap();
        let depth = circuit.depth_of(a.id()).max(circuit.depth_of(b.id()));
        circuit.push(Gate::Xor(a.id(), b.id()), None, depth, a.lanes)
    }

    fn not(&self, a: &Self::Bit) -> Self::Bit {
        let mut circuit = self.circuit.lock().unwrap();
        let depth = circuit.depth_of(a.id());
        circuit.push(Gate::Not(a.id()), None, depth, a.lanes)
    }

    async fn share(
        &self,
        owner: Role,
        values: &[Lanes],
        count: usize,
        lanes: usize,
    ) -> Result<Vec<Self::Bit>, Error> {
        let shares = share_input(&self.session, owner, values, count, lanes).await?;
        Ok(self.known(shares))
    }

    async fn from_xor_shares(&self, shares: &[Lanes]) -> Result<Vec<Self::Bit>, Error> {
        uniform_lanes(shares)?;
        Ok(self.known(shares.to_vec()))
    }

    async fn multiply(&self, x: &[Self::Bit], y: &[Self::Bit]) -> Result<Vec<Self::Bit>, Error> {
        LengthError::check(x.len(), y.len())?;
        if let Some(first) = x.first() {
            if let Some(other) = x.iter().chain(y).find(|w| w.lanes != first.lanes) {
                return Err(Error::LaneMismatch {
                    expected: first.lanes,
                    actual: other.lanes,
                });
            }
        }

        let mut circuit = self.circuit.lock().unwrap();
        Ok(x.iter()
            .zip(y)
            .map(|(a, b)| {
                let depth = circuit.depth_of(a.id()).max(circuit.depth_of(b.id())) + 1;
                circuit.push(Gate::And(a.id(), b.id()), None, depth, a.lanes)
            })
            .collect())
    }

    async fn open_to_party(
        &self,
        values: &[Self::Bit],
        party: Role,
    ) -> Result<Option<Vec<Lanes>>, Error> {
        let shares = self.evaluated(values).await?;
        open_shares(&self.session, &shares, party).await
    }

    async fn extract_shares(&self, values: &[Self::Bit]) -> Result<Vec<Lanes>, Error> {
        self.evaluated(values).await
    }

    fn stats(&self) -> EngineStats {
        self.session.stats()
    }
}
