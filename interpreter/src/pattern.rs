use spool::instruction::Target;

use crate::environment::Environment;
use crate::error::RuntimeError;
use crate::runtime_value::RuntimeValue;

/// Bind `value` to a loop or assignment target, unpacking tuples
/// element-wise.
pub fn bind_target(
    target: &Target,
    value: RuntimeValue,
    env: &mut Environment,
) -> Result<(), RuntimeError> {
    match target {
        Target::Name(name) => {
            env.set_variable(name, value);
            Ok(())
        }
        Target::Tuple(targets) => {
            let items = match &value {
                RuntimeValue::Range { .. } if value.range_len() != targets.len() as u128 => {
                    return Err(RuntimeError::Unpack {
                        expected: targets.len(),
                        got: usize::try_from(value.range_len()).unwrap_or(usize::MAX),
                    });
                }
                RuntimeValue::Dict(_) | RuntimeValue::Range { .. } | RuntimeValue::Str(_) => {
                    value.iterate()?
                }
                RuntimeValue::List(items) | RuntimeValue::Tuple(items) => items.clone(),
                other => {
                    return Err(RuntimeError::type_error(
                        "an unpackable value",
                        other.type_name(),
                    ));
                }
            };
            if items.len() != targets.len() {
                return Err(RuntimeError::Unpack {
                    expected: targets.len(),
                    got: items.len(),
                });
            }
            for (target, item) in targets.iter().zip(items) {
                bind_target(target, item, env)?;
            }
            Ok(())
        }
    }
}
