//! Pairs tool invocation tags with their result tags.

use super::model::CombinedCall;
use crate::markup::TagNode;

/// Pair the call tags of an assistant message with the result tags of the
/// tool messages that follow it.
///
/// The matching is greedy and order-preserving: calls are scanned in
/// order, and each claims the first unclaimed result with the same tag
/// name whose attributes are a superset-compatible match (every attribute
/// on the call equals the result's value for that key). Results cannot
/// arrive before their call on this protocol, so arrival order is a
/// reliable signal and greedy matching avoids re-pairing when names
/// collide. Calls still streaming in (not yet closed) are skipped;
/// unmatched calls keep `result = None`.
pub fn combine_calls(call_nodes: &[&TagNode], result_nodes: &[&TagNode]) -> Vec<CombinedCall> {
    let mut claimed = vec![false; result_nodes.len()];
    let mut combined = Vec::new();

    for call in call_nodes {
        if !call.closed {
            continue;
        }

        let mut matched = None;
        for (index, result) in result_nodes.iter().enumerate() {
            if claimed[index] || result.name != call.name {
                continue;
            }
            if attributes_compatible(call, result) {
                matched = Some(index);
                break;
            }
        }
        if let Some(index) = matched {
            claimed[index] = true;
        }

        combined.push(CombinedCall {
            call: (*call).clone(),
            result: matched.map(|index| result_nodes[index].clone()),
            id: call.id.clone(),
            sequence: combined.len(),
        });
    }

    combined
}

fn attributes_compatible(call: &TagNode, result: &TagNode) -> bool {
    call.attributes
        .iter()
        .all(|(key, value)| result.attributes.get(key) == Some(value))
}
