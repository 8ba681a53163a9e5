use crate::{
    error::{Error, LengthError},
    helpers::Role,
    protocol::{
        attribution::{
            input::{InputEncryption, PrivateTouchpoint, TouchpointBatch},
            rule::AttributionRule,
        },
        engine::SecureEngine,
    },
    secret_sharing::Lanes,
};

/// Computes the part of `rule` that depends on the touchpoint alone, once per touchpoint, so it
/// can be reused for every conversion.
///
/// Rules that do not require clicks yield the public constant `true`. Otherwise, with plaintext
/// input the publisher evaluates the click filter on its own records and shares the result; with
/// XOR-encoded input the shared `is_click` bit is used as is. `plaintext` holds one column per
/// touchpoint position and is only read by the publisher under plaintext encoding.
///
/// ## Errors
/// If `plaintext` does not match `private` on the party that reads it. Propagates engine errors.
#[tracing::instrument(level = "debug", skip_all, fields(role = ?engine.role(), rule = %rule))]
pub async fn privately_share_thresholds<E: SecureEngine>(
    engine: &E,
    plaintext: &[TouchpointBatch],
    private: &[PrivateTouchpoint<E::Bit>],
    rule: &AttributionRule,
    encryption: InputEncryption,
) -> Result<Vec<E::Bit>, Error> {
    let Some(lanes) = private.first().map(|tp| engine.lanes(&tp.is_click)) else {
        return Ok(Vec::new());
    };

    if !rule.requires_click {
        return Ok(private
            .iter()
            .map(|_| engine.constant(Lanes::repeat(true, lanes)))
            .collect());
    }

    match encryption {
        InputEncryption::Plaintext => {
            let clicks = if engine.role() == Role::Publisher || !plaintext.is_empty() {
                LengthError::check(private.len(), plaintext.len())?;
                plaintext
                    .iter()
                    .map(TouchpointBatch::click_lanes)
                    .collect::<Vec<_>>()
            } else {
                Vec::new()
            };
            engine
                .share(Role::Publisher, &clicks, private.len(), lanes)
                .await
        }
        InputEncryption::PartnerXor | InputEncryption::Xor => {
            Ok(private.iter().map(|tp| tp.is_click.clone()).collect())
        }
    }
}
