use crate::{
    error::{Error, LengthError},
    helpers::{Operation, Role},
    protocol::{engine::Session, prss::InsecureDealer},
    secret_sharing::{Lanes, and_lanes, xor_lanes},
};

/// Concatenates values into a single lane vector.
pub(super) fn flatten(values: &[Lanes]) -> Lanes {
    let mut all = Lanes::with_capacity(values.iter().map(Lanes::len).sum());
    for value in values {
        all.extend_from_bitslice(value);
    }
    all
}

/// Inverse of [`flatten`] for values of `lanes` lanes each.
///
/// ## Panics
/// If `lanes` is zero.
pub(super) fn split(all: &Lanes, lanes: usize) -> Vec<Lanes> {
    all.chunks(lanes).map(|chunk| chunk.to_bitvec()).collect()
}

/// Multiplies XOR-shared bit vectors `x` and `y` lane by lane with Beaver triples, using exactly
/// one exchange with the peer for the whole batch.
///
/// Each party masks its shares with its share of the triple, `d = x ^ a` and `e = y ^ b`, and
/// both open `d` and `e`. The product share is then `c ^ (d & b) ^ (e & a)`, and the publisher
/// additionally adds the public `d & e`.
pub(super) async fn multiply(
    session: &Session,
    dealer: &InsecureDealer,
    x: &[Lanes],
    y: &[Lanes],
) -> Result<Vec<Lanes>, Error> {
    LengthError::check(x.len(), y.len())?;
    let lanes = match super::uniform_lanes(x.iter().chain(y))? {
        None => return Ok(Vec::new()),
        Some(lanes) => lanes,
    };
    if lanes == 0 {
        return Ok(vec![Lanes::new(); x.len()]);
    }
    let x = flatten(x);
    let y = flatten(y);
    let total = x.len();

    let triple = dealer.triples(total);
    let d = xor_lanes(&x, &triple.a);
    let e = xor_lanes(&y, &triple.b);
    let [peer_d, peer_e]: [Lanes; 2] = session
        .exchange_lanes(Operation::Multiply, &[d.clone(), e.clone()], total)
        .await?
        .try_into()
        .map_err(|v: Vec<Lanes>| {
            Error::Length(LengthError {
                expected: 2,
                actual: v.len(),
            })
        })?;
    let d = xor_lanes(&d, &peer_d);
    let e = xor_lanes(&e, &peer_e);

    let mut z = xor_lanes(
        &triple.c,
        &xor_lanes(&and_lanes(&d, &triple.b), &and_lanes(&e, &triple.a)),
    );
    if session.role() == Role::Publisher {
        z = xor_lanes(&z, &and_lanes(&d, &e));
    }
    session.record_and_gates(total, 1);

    Ok(split(&z, lanes))
}
