use primitives::ActionType;

use crate::error::InterpreterError;
use crate::host::{Host, HostValue};
use crate::stack::StackMachine;

/// Pops `ACTION` arguments off the VM stack, invokes the host, and pushes
/// the return value (spec §4.5).
///
/// `arg_count` is the runtime count carried by the `ACTION` instruction;
/// the host's declared signature still drives how many cells are popped and
/// what type each one is — an omitted optional argument leaves its cells
/// off the stack entirely, so only the first `arg_count` parameters of the
/// signature are consulted. `depth` is the dispatching VM's own re-entrancy
/// level, forwarded to `Host::execute_action` so a re-entrant action handler
/// can enforce the recursion ceiling across the whole call chain.
pub fn dispatch(
    stack: &mut StackMachine,
    host: &mut dyn Host,
    ordinal: u16,
    arg_count: u8,
    depth: u32,
) -> Result<(), InterpreterError> {
    let signature = host
        .action_signature(ordinal)
        .ok_or(InterpreterError::ActionFailed { ordinal })?
        .clone();

    if !signature.accepts_arg_count(arg_count) {
        return Err(InterpreterError::ActionArity {
            ordinal,
            got: arg_count,
        });
    }

    let n = arg_count as usize;
    let mut args = Vec::with_capacity(n);
    for ty in signature.parameter_types[..n].iter().rev() {
        args.push(pop_host_value(stack, *ty)?);
    }
    args.reverse();

    let result = host
        .execute_action(ordinal, &args, depth)
        .map_err(|_| InterpreterError::ActionFailed { ordinal })?;

    if signature.return_type != ActionType::Void {
        let value = result.ok_or(InterpreterError::ActionFailed { ordinal })?;
        push_host_value(stack, value);
    }

    Ok(())
}

fn pop_host_value(stack: &mut StackMachine, ty: ActionType) -> Result<HostValue, InterpreterError> {
    Ok(match ty {
        ActionType::Void => return Err(InterpreterError::TypeMismatch {
            expected: primitives::Tag::Int,
            found: primitives::Tag::Int,
        }),
        ActionType::Int => HostValue::Int(stack.pop_int()?),
        ActionType::Float => HostValue::Float(stack.pop_float()?),
        ActionType::String => HostValue::String(stack.pop_string()?),
        ActionType::Object => HostValue::Object(stack.pop_object()?),
        ActionType::Vector => {
            let (x, y, z) = stack.pop_vector()?;
            HostValue::Vector(x, y, z)
        }
        ActionType::Engine(k) => HostValue::Engine(stack.pop_engine(k)?),
        ActionType::Action => HostValue::Action,
    })
}

fn push_host_value(stack: &mut StackMachine, value: HostValue) {
    match value {
        HostValue::Int(v) => stack.push_int(v),
        HostValue::Float(v) => stack.push_float(v),
        HostValue::String(v) => stack.push_string(v),
        HostValue::Object(v) => stack.push_object(v),
        HostValue::Vector(x, y, z) => stack.push_vector(x, y, z),
        HostValue::Engine(v) => stack.push_engine(v),
        HostValue::Action => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use primitives::{ActionSignature, EngineHandle};

    struct StubHost {
        signature: ActionSignature,
        reply: i32,
    }

    impl Host for StubHost {
        fn action_signature(&self, ordinal: u16) -> Option<&ActionSignature> {
            (ordinal == self.signature.ordinal).then_some(&self.signature)
        }

        fn execute_action(
            &mut self,
            _ordinal: u16,
            args: &[HostValue],
            _depth: u32,
        ) -> Result<Option<HostValue>, InterpreterError> {
            let HostValue::Int(a) = args[0] else { panic!("expected int arg") };
            Ok(Some(HostValue::Int(a + self.reply)))
        }

        fn create_engine_structure(&mut self, type_id: primitives::EngineTypeId) -> EngineHandle {
            unimplemented!("not exercised by this test: {type_id}")
        }
    }

    #[test]
    fn dispatches_and_pushes_return_value() {
        let mut host = StubHost {
            signature: ActionSignature {
                ordinal: 5,
                name: "AddOne".into(),
                min_params: 1,
                num_params: 1,
                parameter_types: vec![ActionType::Int],
                return_type: ActionType::Int,
            },
            reply: 1,
        };
        let mut stack = StackMachine::new();
        stack.push_int(41);
        dispatch(&mut stack, &mut host, 5, 1, 0).unwrap();
        assert_eq!(stack.pop_int().unwrap(), 42);
    }

    #[test]
    fn rejects_arity_outside_declared_range() {
        let mut host = StubHost {
            signature: ActionSignature {
                ordinal: 5,
                name: "AddOne".into(),
                min_params: 1,
                num_params: 1,
                parameter_types: vec![ActionType::Int],
                return_type: ActionType::Int,
            },
            reply: 1,
        };
        let mut stack = StackMachine::new();
        assert_eq!(
            dispatch(&mut stack, &mut host, 5, 0, 0),
            Err(InterpreterError::ActionArity { ordinal: 5, got: 0 })
        );
    }
}
