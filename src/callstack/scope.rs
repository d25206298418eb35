//! Call stack scopes and their discovery in the attribute tree.

use crate::oracle::{AttributeId, StateOracle};
use crate::utils::config::{CALLSTACK_ATTRIBUTE, PROCESSES_ATTRIBUTE, THREADS_ATTRIBUTE};
use crate::utils::error::OracleError;
use log::{debug, warn};

/// One thread's call stack: the attribute whose children are the depth slots
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallStackScope {
    pub process_id: i32,
    pub thread_id: i32,
    pub attribute: AttributeId,
}

/// Find every `Processes/<pid>/Threads/<tid>/CallStack` attribute
///
/// **Public** - lets the orchestrator enumerate what to analyse
///
/// Process and thread attributes whose names are not integers are skipped.
pub fn discover_call_stacks<O: StateOracle + ?Sized>(
    oracle: &O,
) -> Result<Vec<CallStackScope>, OracleError> {
    let mut scopes = Vec::new();

    let Some(processes) = oracle.child_named(None, PROCESSES_ATTRIBUTE)? else {
        debug!("No {} attribute; nothing to analyse", PROCESSES_ATTRIBUTE);
        return Ok(scopes);
    };

    for process in oracle.child_attributes(processes)? {
        let Some(process_id) = parse_id(oracle, process)? else {
            continue;
        };
        let Some(threads) = oracle.child_named(Some(process), THREADS_ATTRIBUTE)? else {
            continue;
        };

        for thread in oracle.child_attributes(threads)? {
            let Some(thread_id) = parse_id(oracle, thread)? else {
                continue;
            };
            if let Some(attribute) = oracle.child_named(Some(thread), CALLSTACK_ATTRIBUTE)? {
                scopes.push(CallStackScope {
                    process_id,
                    thread_id,
                    attribute,
                });
            }
        }
    }

    debug!("Discovered {} call stacks", scopes.len());
    Ok(scopes)
}

fn parse_id<O: StateOracle + ?Sized>(
    oracle: &O,
    attribute: AttributeId,
) -> Result<Option<i32>, OracleError> {
    let name = oracle.attribute_name(attribute)?;
    match name.parse::<i32>() {
        Ok(id) => Ok(Some(id)),
        Err(_) => {
            warn!("Skipping non-numeric id attribute '{}'", name);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MemoryStateSystem;

    #[test]
    fn test_discover_call_stacks() {
        let mut ss = MemoryStateSystem::new(0);
        let a = ss.attribute_for_path(&["Processes", "10", "Threads", "11", "CallStack"]);
        let b = ss.attribute_for_path(&["Processes", "10", "Threads", "12", "CallStack"]);
        ss.attribute_for_path(&["Processes", "kernel", "Threads", "1", "CallStack"]);
        ss.attribute_for_path(&["Processes", "20", "Threads", "21", "Other"]);

        let scopes = discover_call_stacks(&ss).unwrap();
        assert_eq!(
            scopes,
            vec![
                CallStackScope { process_id: 10, thread_id: 11, attribute: a },
                CallStackScope { process_id: 10, thread_id: 12, attribute: b },
            ]
        );
    }

    #[test]
    fn test_discover_empty_state() {
        let ss = MemoryStateSystem::new(0);
        assert!(discover_call_stacks(&ss).unwrap().is_empty());
    }
}
