//! Stack manipulation and arithmetic handlers.

use stacktester_core::Element;

use super::{bytes_param, count_param, take};
use crate::context::Context;
use crate::operation::Instruction;
use crate::{Error, Result};

/// PUSH: push the immediate operand.
pub async fn push(ctx: &mut Context, instruction: &Instruction) -> Result<()> {
    let operand = instruction
        .operand()
        .cloned()
        .ok_or_else(|| Error::InvalidInstruction {
            reason: "PUSH without an operand".into(),
        })?;
    ctx.push(operand);
    Ok(())
}

/// POP: discard the top entry without resolving it.
pub async fn pop(ctx: &mut Context) -> Result<()> {
    ctx.stack_mut().pop()?;
    Ok(())
}

/// DUP
pub async fn dup(ctx: &mut Context) -> Result<()> {
    ctx.stack_mut().duplicate_top()
}

/// EMPTY_STACK
pub async fn empty_stack(ctx: &mut Context) -> Result<()> {
    ctx.stack_mut().clear();
    Ok(())
}

/// SWAP: pop a depth, then exchange the top entry with the entry that far
/// below it.
pub async fn swap(ctx: &mut Context) -> Result<()> {
    let depth = count_param("SWAP", &ctx.pop_param().await?)?;
    ctx.stack_mut().swap(depth)
}

/// WAIT_FUTURE: resolve the top entry and push it back with its origin
/// index.
pub async fn wait_future(ctx: &mut Context) -> Result<()> {
    let entry = ctx.stack_mut().pop()?;
    let resolved = entry.resolve().await?;
    ctx.stack_mut().push(resolved);
    Ok(())
}

/// SUB: `PUSH a, PUSH b, SUB` pushes `a - b`.
pub async fn sub(ctx: &mut Context) -> Result<()> {
    let [a, b] = take::<2>("SUB", ctx.pop_params(2).await?)?;
    match (a, b) {
        (Element::Int(a), Element::Int(b)) => {
            ctx.push(Element::Int(a - b));
            Ok(())
        }
        (a, b) => Err(Error::parameter(
            "SUB",
            format!("expected integers, found {} and {}", a.type_name(), b.type_name()),
        )),
    }
}

/// CONCAT: `PUSH a, PUSH b, CONCAT` pushes `a ++ b`, as text when both are
/// strings and as bytes otherwise.
pub async fn concat(ctx: &mut Context) -> Result<()> {
    let [a, b] = take::<2>("CONCAT", ctx.pop_params(2).await?)?;
    let joined = match (a, b) {
        (Element::String(a), Element::String(b)) => Element::String(a + &b),
        (a, b) => {
            let mut joined = bytes_param("CONCAT", a)?;
            joined.extend(bytes_param("CONCAT", b)?);
            Element::Bytes(joined)
        }
    };
    ctx.push(joined);
    Ok(())
}
