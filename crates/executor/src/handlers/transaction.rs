//! Transaction lifecycle handlers.
//!
//! Commit, versionstamp and ON_ERROR results are pushed as pending entries;
//! the version operations complete before the instruction does.

use stacktester_core::{
    code, prefix_range, retry, Element, KeySelector, RangeOptions, StoreError, StreamingMode,
};
use tracing::debug;

use super::{bytes_param, int_param};
use crate::context::Context;
use crate::pending::{error_marker, marker, PendingResult};
use crate::{Error, Result};

/// NEW_TRANSACTION and RESET: bind a fresh transaction.
pub async fn new_transaction(ctx: &mut Context) -> Result<()> {
    ctx.new_transaction()
}

/// USE_TRANSACTION: switch to the popped binding name.
pub async fn use_transaction(ctx: &mut Context) -> Result<()> {
    let name = bytes_param("USE_TRANSACTION", ctx.pop_param().await?)?;
    ctx.switch_transaction(name)
}

/// COMMIT: push the pending commit.
pub async fn commit(ctx: &mut Context) -> Result<()> {
    let issued = ctx.transaction().commit();
    ctx.push_pending(PendingResult::spawn(async move {
        issued.await?;
        Ok(None)
    }));
    Ok(())
}

/// CANCEL: cancel the bound transaction in place.
pub async fn cancel(ctx: &mut Context) -> Result<()> {
    ctx.transaction().cancel();
    Ok(())
}

/// ON_ERROR: run the retry protocol for the popped error code.
///
/// On success the retried transaction replaces the old one if it is still
/// bound; on failure a fresh transaction does. The two resource-lifecycle
/// codes are never handed to the store: a conflict is retried in their place
/// and, once that decision is in, the original code is raised from the
/// instruction instead of pushing a pending result.
pub async fn on_error(ctx: &mut Context) -> Result<()> {
    let requested = int_param("ON_ERROR", &ctx.pop_param().await?)?;
    let requested = i32::try_from(requested)
        .map_err(|_| Error::parameter("ON_ERROR", format!("error code {requested} out of range")))?;
    let error = StoreError::new(requested);
    let filtered = error.is_resource_lifecycle();
    let probe = if filtered {
        StoreError::new(code::NOT_COMMITTED)
    } else {
        error
    };

    let cell = ctx.cell();
    let db = ctx.database();
    let old = cell.load();
    let issued = old.on_error(probe);
    let pending = PendingResult::spawn(async move {
        match issued.await {
            Ok(fresh) => {
                if !cell.update_current(&old, fresh) {
                    debug!("Retried transaction was already replaced");
                }
                Ok(None)
            }
            Err(e) => {
                cell.renew(db.as_ref(), &old)?;
                Err(e.into())
            }
        }
    });

    if filtered {
        pending.wait().await?;
        return Err(error.into());
    }
    ctx.push_pending(pending);
    Ok(())
}

/// GET_READ_VERSION: remember the read version and push a marker.
pub async fn get_read_version(ctx: &mut Context) -> Result<()> {
    let version = ctx.transaction().get_read_version().await?;
    ctx.set_last_version(version);
    ctx.push(Element::bytes(marker::GOT_READ_VERSION.to_vec()));
    Ok(())
}

/// SET_READ_VERSION: pin the remembered version.
pub async fn set_read_version(ctx: &mut Context) -> Result<()> {
    let version = ctx.last_version().ok_or(Error::MissingReadVersion)?;
    ctx.transaction().set_read_version(version);
    Ok(())
}

/// GET_COMMITTED_VERSION: remember the committed version and push a marker.
pub async fn get_committed_version(ctx: &mut Context) -> Result<()> {
    match ctx.transaction().get_committed_version() {
        Ok(version) => {
            ctx.set_last_version(version);
            ctx.push(Element::bytes(marker::GOT_COMMITTED_VERSION.to_vec()));
        }
        Err(e) => ctx.push(error_marker(e.code())?),
    }
    Ok(())
}

/// GET_VERSIONSTAMP: push the pending versionstamp.
pub async fn get_versionstamp(ctx: &mut Context) -> Result<()> {
    let issued = ctx.transaction().get_versionstamp();
    ctx.push_pending(PendingResult::spawn(async move {
        Ok(Some(Element::Bytes(issued.await?)))
    }));
    Ok(())
}

/// WAIT_EMPTY: retry until no key starts with the popped prefix.
pub async fn wait_empty(ctx: &mut Context) -> Result<()> {
    let prefix = bytes_param("WAIT_EMPTY", ctx.pop_param().await?)?;
    let (begin, end) =
        prefix_range(&prefix).map_err(|e| Error::parameter("WAIT_EMPTY", e.to_string()))?;
    let begin = KeySelector::first_greater_or_equal(begin);
    let end = KeySelector::first_greater_or_equal(end);
    let options = RangeOptions::new(1, false, StreamingMode::Exact);

    retry::run(ctx.database(), move |tr| {
        let page = tr.get_range(&begin, &end, &options, false);
        Box::pin(async move {
            if page.await?.entries.is_empty() {
                Ok(())
            } else {
                Err(StoreError::new(code::NOT_COMMITTED))
            }
        })
    })
    .await?;

    ctx.push(Element::bytes(marker::WAITED_FOR_EMPTY.to_vec()));
    Ok(())
}
