use crate::caveat::Caveat;
use crate::error::MacaroonError;
use crate::macaroon::Macaroon;
use crate::ByteString;
use crate::Result;

/// The caller-supplied environment a verification runs in.
///
/// The library owns none of the hard choices here: which scheme and key
/// verify a given token, where discharge macaroons come from, and what an
/// unmatched caveat string means are all the caller's business. The
/// verifier only walks the token graph and compares bytes.
pub trait Context {
    /// Check the signature of a macaroon (primary or discharge). Discharge
    /// macaroons reach this already [bound](Macaroon::bind) by their
    /// sender; see
    /// [`HmacSha256Signer::verify_discharge`](crate::HmacSha256Signer::verify_discharge).
    fn verify_signature(&self, macaroon: &Macaroon) -> Result<()>;

    /// Resolve the discharge macaroon for a third-party caveat.
    fn discharge_macaroon(&self, caveat: &Caveat) -> Result<Macaroon>;

    /// Decide a caveat no required operation matched. Returning an error
    /// rejects the whole token.
    fn process_operation(&self, operation: &ByteString) -> Result<()>;
}

struct Operation {
    value: ByteString,
    authorized: bool,
}

/// Verify `primary` against the operations the caller wants to perform.
///
/// The primary's signature is checked first, then every reachable
/// discharge macaroon is fetched through the context, checked, and its
/// caveats folded into one operation list (depth first, so a discharge's
/// caveats follow the caveat that demanded it). Each required operation
/// must match a caveat by exact bytes; earlier operations consume earlier
/// caveats, so a repeated operation claims the next unclaimed caveat with
/// that value. Every caveat left unclaimed is offered to
/// [`Context::process_operation`]. A single failure anywhere rejects the
/// token; there is no partial acceptance.
pub fn verify<C: Context>(
    primary: &Macaroon,
    context: &C,
    required_operations: &[ByteString],
) -> Result<()> {
    let mut operations = Vec::new();
    process_macaroon(primary, context, &mut operations)?;

    for required in required_operations {
        match operations
            .iter_mut()
            .find(|op| !op.authorized && op.value == *required)
        {
            Some(op) => op.authorized = true,
            None => {
                debug!("verify: no caveat matches operation {:?}", required);
                return Err(MacaroonError::OperationNotInCaveats(required.clone()));
            }
        }
    }

    for op in operations.iter().filter(|op| !op.authorized) {
        context
            .process_operation(&op.value)
            .map_err(|_| MacaroonError::CaveatNotSatisfied(op.value.clone()))?;
    }

    Ok(())
}

fn process_macaroon<C: Context>(
    macaroon: &Macaroon,
    context: &C,
    operations: &mut Vec<Operation>,
) -> Result<()> {
    context.verify_signature(macaroon)?;
    for caveat in macaroon.caveats() {
        operations.push(Operation {
            value: caveat.id().clone(),
            authorized: false,
        });
        if caveat.is_third_party() {
            let discharge = context
                .discharge_macaroon(caveat)
                .map_err(|e| MacaroonError::DischargeLookupFailed(e.to_string()))?;
            process_macaroon(&discharge, context, operations)?;
        }
    }
    Ok(())
}
