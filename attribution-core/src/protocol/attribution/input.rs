use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, LengthError},
    helpers::Role,
    protocol::engine::SecureEngine,
    secret_sharing::{BitDecomposed, Lanes, into_bit_planes},
};

/// Width of secret timestamps.
pub const TS_BITS: usize = 32;
/// Width of secret touchpoint identifiers.
pub const ID_BITS: usize = 64;

const TOUCHPOINT_PLANES: usize = ID_BITS + 1 + TS_BITS;
const CONVERSION_PLANES: usize = TS_BITS;

/// An ad impression or click. Under the XOR encodings every field holds this party's share.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Touchpoint {
    pub id: u64,
    pub is_click: bool,
    pub ts: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    pub ts: u32,
}

/// One touchpoint position of a batch, in columnar form: slot `i` of every column belongs to
/// lane (row) `i`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TouchpointBatch {
    pub id: Vec<u64>,
    pub is_click: Vec<bool>,
    pub ts: Vec<u32>,
}

impl TouchpointBatch {
    /// Number of lanes.
    ///
    /// ## Errors
    /// If the columns have different lengths.
    pub fn lanes(&self) -> Result<usize, Error> {
        LengthError::check(self.id.len(), self.is_click.len())?;
        LengthError::check(self.id.len(), self.ts.len())?;
        Ok(self.id.len())
    }

    #[must_use]
    pub fn click_lanes(&self) -> Lanes {
        self.is_click.iter().copied().collect()
    }
}

impl FromIterator<Touchpoint> for TouchpointBatch {
    fn from_iter<T: IntoIterator<Item = Touchpoint>>(iter: T) -> Self {
        let mut batch = Self::default();
        for touchpoint in iter {
            batch.id.push(touchpoint.id);
            batch.is_click.push(touchpoint.is_click);
            batch.ts.push(touchpoint.ts);
        }
        batch
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionBatch {
    pub ts: Vec<u32>,
}

impl FromIterator<Conversion> for ConversionBatch {
    fn from_iter<T: IntoIterator<Item = Conversion>>(iter: T) -> Self {
        Self {
            ts: iter.into_iter().map(|c| c.ts).collect(),
        }
    }
}

/// Secret-shared touchpoint. Every bit holds one value per lane.
#[derive(Clone, Debug)]
pub struct PrivateTouchpoint<B> {
    pub id: BitDecomposed<B>,
    pub is_click: B,
    pub ts: BitDecomposed<B>,
}

#[derive(Clone, Debug)]
pub struct PrivateConversion<B> {
    pub ts: BitDecomposed<B>,
}

/// How input records are encoded before they reach the protocol. Both parties must agree on it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEncryption {
    /// Each party holds its own records in the clear.
    #[default]
    Plaintext,
    /// Publisher touchpoints are masked with a XOR mask that the partner holds. Conversions are
    /// in the clear on the partner side.
    PartnerXor,
    /// Both parties hold XOR shares of every record.
    Xor,
}

impl InputEncryption {
    /// Whether `role` supplies touchpoint data under this encoding.
    #[must_use]
    pub fn holds_touchpoints(self, role: Role) -> bool {
        self != InputEncryption::Plaintext || role == Role::Publisher
    }

    /// Whether `role` supplies conversion data under this encoding.
    #[must_use]
    pub fn holds_conversions(self, role: Role) -> bool {
        self == InputEncryption::Xor || role == Role::Partner
    }

    /// `None` if the records are already XOR-shared, otherwise the party sharing them.
    fn owner(self, touchpoints: bool) -> Option<Role> {
        match (self, touchpoints) {
            (InputEncryption::Plaintext, true) => Some(Role::Publisher),
            (InputEncryption::Plaintext | InputEncryption::PartnerXor, false) => Some(Role::Partner),
            (InputEncryption::PartnerXor | InputEncryption::Xor, true)
            | (InputEncryption::Xor, false) => None,
        }
    }
}

fn touchpoint_planes(batch: &TouchpointBatch) -> Result<Vec<Lanes>, Error> {
    batch.lanes()?;
    let mut planes = Vec::with_capacity(TOUCHPOINT_PLANES);
    planes.extend(into_bit_planes(batch.id.iter().copied(), ID_BITS)?);
    planes.push(batch.click_lanes());
    planes.extend(into_bit_planes(batch.ts.iter().map(|&ts| u64::from(ts)), TS_BITS)?);
    Ok(planes)
}

fn conversion_planes(batch: &ConversionBatch) -> Result<Vec<Lanes>, Error> {
    Ok(
        into_bit_planes(batch.ts.iter().map(|&ts| u64::from(ts)), TS_BITS)?
            .into_iter()
            .collect(),
    )
}

/// Installs `records` records of `planes` bit planes each, either by secret-sharing them from
/// their owner or by taking the local XOR shares as they are.
async fn install<E: SecureEngine>(
    engine: &E,
    owner: Option<Role>,
    values: Vec<Lanes>,
    planes: usize,
    records: usize,
    lanes: usize,
) -> Result<Vec<E::Bit>, Error> {
    match owner {
        Some(owner) => engine.share(owner, &values, records * planes, lanes).await,
        None => {
            LengthError::check(records * planes, values.len())?;
            engine.from_xor_shares(&values).await
        }
    }
}

/// Checks that a party supplying records supplied exactly `expected` of them.
fn check_columns(
    what: &'static str,
    supplied: bool,
    count: usize,
    expected: usize,
) -> Result<(), Error> {
    if !supplied {
        return Ok(());
    }
    if count == 0 && expected > 0 {
        return Err(Error::MissingInput(what));
    }
    LengthError::check(expected, count)?;
    Ok(())
}

/// Secret-shares touchpoints given in columnar form, one [`TouchpointBatch`] per touchpoint
/// position with `lanes` lanes each. Parties that do not hold touchpoint data under `encryption`
/// pass an empty slice. Records supplied by a party that does not own them are validated but
/// only a standalone [`PlaintextEngine`] reads them.
///
/// [`PlaintextEngine`]: crate::protocol::engine::PlaintextEngine
///
/// ## Errors
/// If the holder's columns do not match `touchpoints` × `lanes` or a field does not fit its
/// width. Propagates engine errors.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(role = ?engine.role(), touchpoints = touchpoints, lanes = lanes)
)]
pub async fn privately_share_touchpoint_batches<E: SecureEngine>(
    engine: &E,
    columns: &[TouchpointBatch],
    touchpoints: usize,
    lanes: usize,
    encryption: InputEncryption,
) -> Result<Vec<PrivateTouchpoint<E::Bit>>, Error> {
    let supplied = encryption.holds_touchpoints(engine.role()) || !columns.is_empty();
    check_columns("touchpoints", supplied, columns.len(), touchpoints)?;
    let mut values = Vec::new();
    if supplied {
        for column in columns {
            LengthError::check(lanes, column.lanes()?)?;
            values.extend(touchpoint_planes(column)?);
        }
    }

    let bits = install(
        engine,
        encryption.owner(true),
        values,
        TOUCHPOINT_PLANES,
        touchpoints,
        lanes,
    )
    .await?;

    Ok(bits
        .chunks(TOUCHPOINT_PLANES)
        .map(|planes| PrivateTouchpoint {
            id: planes[..ID_BITS].iter().cloned().collect(),
            is_click: planes[ID_BITS].clone(),
            ts: planes[ID_BITS + 1..].iter().cloned().collect(),
        })
        .collect())
}

/// Columnar counterpart of [`privately_share_conversions`].
///
/// ## Errors
/// If the holder's columns do not match `conversions` × `lanes`. Propagates engine errors.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(role = ?engine.role(), conversions = conversions, lanes = lanes)
)]
pub async fn privately_share_conversion_batches<E: SecureEngine>(
    engine: &E,
    columns: &[ConversionBatch],
    conversions: usize,
    lanes: usize,
    encryption: InputEncryption,
) -> Result<Vec<PrivateConversion<E::Bit>>, Error> {
    let supplied = encryption.holds_conversions(engine.role()) || !columns.is_empty();
    check_columns("conversions", supplied, columns.len(), conversions)?;
    let mut values = Vec::new();
    if supplied {
        for column in columns {
            LengthError::check(lanes, column.ts.len())?;
            values.extend(conversion_planes(column)?);
        }
    }

    let bits = install(
        engine,
        encryption.owner(false),
        values,
        CONVERSION_PLANES,
        conversions,
        lanes,
    )
    .await?;

    Ok(bits
        .chunks(CONVERSION_PLANES)
        .map(|planes| PrivateConversion {
            ts: planes.iter().cloned().collect(),
        })
        .collect())
}

/// Flattens `rows` into single-lane columns, one per record.
fn single_lane<T: Copy, B: FromIterator<T>>(rows: &[Vec<T>]) -> Vec<B> {
    rows.iter()
        .flatten()
        .map(|&record| std::iter::once(record).collect())
        .collect()
}

/// Secret-shares `rows` × `touchpoints` touchpoints with one lane each and returns them per row.
/// Every row is shared in the same batch of operations.
///
/// ## Errors
/// If the holder's rows do not all have `touchpoints` records, or a field does not fit its width.
/// Propagates engine errors.
pub async fn privately_share_touchpoints<E: SecureEngine>(
    engine: &E,
    rows: &[Vec<Touchpoint>],
    row_count: usize,
    touchpoints: usize,
    encryption: InputEncryption,
) -> Result<Vec<Vec<PrivateTouchpoint<E::Bit>>>, Error> {
    if (encryption.holds_touchpoints(engine.role()) && touchpoints > 0) || !rows.is_empty() {
        check_columns("touchpoints", true, rows.len(), row_count)?;
        for row in rows {
            LengthError::check(touchpoints, row.len())?;
        }
    }
    let columns = single_lane::<_, TouchpointBatch>(rows);
    let shared = privately_share_touchpoint_batches(
        engine,
        &columns,
        row_count * touchpoints,
        1,
        encryption,
    )
    .await?;

    Ok(per_row(shared, touchpoints, row_count))
}

/// Secret-shares `rows` × `conversions` conversions with one lane each and returns them per row.
///
/// ## Errors
/// If the holder's rows do not all have `conversions` records. Propagates engine errors.
pub async fn privately_share_conversions<E: SecureEngine>(
    engine: &E,
    rows: &[Vec<Conversion>],
    row_count: usize,
    conversions: usize,
    encryption: InputEncryption,
) -> Result<Vec<Vec<PrivateConversion<E::Bit>>>, Error> {
    if (encryption.holds_conversions(engine.role()) && conversions > 0) || !rows.is_empty() {
        check_columns("conversions", true, rows.len(), row_count)?;
        for row in rows {
            LengthError::check(conversions, row.len())?;
        }
    }
    let columns = single_lane::<_, ConversionBatch>(rows);
    let shared = privately_share_conversion_batches(
        engine,
        &columns,
        row_count * conversions,
        1,
        encryption,
    )
    .await?;

    Ok(per_row(shared, conversions, row_count))
}

fn per_row<T>(records: Vec<T>, row_len: usize, rows: usize) -> Vec<Vec<T>> {
    let mut records = records.into_iter();
    (0..rows)
        .map(|_| records.by_ref().take(row_len).collect())
        .collect()
}
