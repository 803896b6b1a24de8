//! Tree-walking evaluator.
//!
//! Statements run against one flat variable table. The cancellation signal
//! is polled before every statement and on every loop iteration, and loops
//! yield to the runtime so the console stays responsive during long runs.

use std::collections::HashMap;

use futures::future::{BoxFuture, FutureExt};
use tether_core::{ConsoleIo, InputError};

use crate::ast::{BinaryOp, Expr, ExprKind, Program, Stmt, StmtKind, UnaryOp};
use crate::error::ScriptError;
use crate::value::Value;

/// Why execution left the program early.
#[derive(Debug)]
pub enum Halt {
    /// A diagnostic for the learner.
    Error(ScriptError),
    /// A stop request was observed.
    Stopped,
    /// The console disappeared from under a pending `input`.
    Detached(InputError),
}

impl From<ScriptError> for Halt {
    fn from(err: ScriptError) -> Self {
        Halt::Error(err)
    }
}

type Flow = Result<(), Halt>;

pub struct Interpreter<'io> {
    io: &'io ConsoleIo,
    vars: HashMap<String, Value>,
}

impl<'io> Interpreter<'io> {
    pub fn new(io: &'io ConsoleIo) -> Self {
        Self {
            io,
            vars: HashMap::new(),
        }
    }

    pub async fn run(&mut self, program: &Program) -> Flow {
        self.exec_block(&program.body).await
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    // Boxed to break the block -> statement -> block recursion.
    fn exec_block<'a>(&'a mut self, block: &'a [Stmt]) -> BoxFuture<'a, Flow> {
        async move {
            for stmt in block {
                self.exec(stmt).await?;
            }
            Ok(())
        }
        .boxed()
    }

    async fn exec(&mut self, stmt: &Stmt) -> Flow {
        self.checkpoint()?;

        match &stmt.kind {
            StmtKind::Print(values) => {
                let text = values
                    .iter()
                    .map(|e| self.eval(e).map(|v| v.to_string()))
                    .collect::<Result<Vec<_>, _>>()?
                    .join(" ");
                self.io.write(&format!("{text}\n"));
                tokio::task::yield_now().await;
            }
            StmtKind::Write(value) => {
                let text = self.eval(value)?.to_string();
                self.io.write(&text);
            }
            StmtKind::Input { name, prompt } => {
                let prompt = match prompt {
                    Some(expr) => self.eval(expr)?.to_string(),
                    None => String::new(),
                };
                let line = match self.io.await_input(&prompt).await {
                    Ok(line) => line,
                    Err(e) if e.is_cancellation() => return Err(Halt::Stopped),
                    Err(e) => return Err(Halt::Detached(e)),
                };
                self.vars.insert(name.clone(), Value::from_input(&line));
            }
            StmtKind::Assign { name, value } => {
                let value = self.eval(value)?;
                self.vars.insert(name.clone(), value);
            }
            StmtKind::If {
                cond,
                then_block,
                else_block,
            } => {
                if self.eval(cond)?.is_truthy() {
                    self.exec_block(then_block).await?;
                } else {
                    self.exec_block(else_block).await?;
                }
            }
            StmtKind::While { cond, body } => loop {
                self.checkpoint()?;
                if !self.eval(cond)?.is_truthy() {
                    break;
                }
                self.exec_block(body).await?;
                tokio::task::yield_now().await;
            },
            StmtKind::For {
                var,
                from,
                to,
                descending,
                body,
            } => {
                let mut i = self.int_bound(from)?;
                let last = self.int_bound(to)?;
                let step = if *descending { -1 } else { 1 };

                while (*descending && i >= last) || (!*descending && i <= last) {
                    self.checkpoint()?;
                    self.vars.insert(var.clone(), Value::Int(i));
                    self.exec_block(body).await?;
                    tokio::task::yield_now().await;
                    match i.checked_add(step) {
                        Some(next) => i = next,
                        None => break,
                    }
                }
            }
        }
        Ok(())
    }

    fn checkpoint(&self) -> Flow {
        self.io.checkpoint().map_err(|_| Halt::Stopped)
    }

    fn int_bound(&self, expr: &Expr) -> Result<i64, ScriptError> {
        match self.eval(expr)? {
            Value::Int(n) => Ok(n),
            other => Err(ScriptError::runtime(
                format!("Loop bounds must be int, got {}", other.type_name()),
                expr.start,
                expr.end,
            )),
        }
    }

    // ────────────────────────────────────────────────────────────
    // Expressions
    // ────────────────────────────────────────────────────────────

    pub fn eval(&self, expr: &Expr) -> Result<Value, ScriptError> {
        match &expr.kind {
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Float(n) => Ok(Value::Float(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Var(name) => self.vars.get(name).cloned().ok_or_else(|| {
                ScriptError::runtime(format!("'{name}' is not defined"), expr.start, expr.end)
            }),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => value
                        .negate()
                        .map_err(|d| ScriptError::runtime(d, expr.start, expr.end)),
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.eval(lhs)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => return Ok(Value::Bool(false)),
                    BinaryOp::Or if left.is_truthy() => return Ok(Value::Bool(true)),
                    BinaryOp::And | BinaryOp::Or => {
                        return Ok(Value::Bool(self.eval(rhs)?.is_truthy()));
                    }
                    _ => {}
                }

                let right = self.eval(rhs)?;
                left.binary(*op, &right).map_err(|details| {
                    // Point at the divisor for the one error that is its fault.
                    let (start, end) = if details == "Division by 0" {
                        (rhs.start, rhs.end)
                    } else {
                        (expr.start, expr.end)
                    };
                    ScriptError::runtime(details, start, end)
                })
            }
        }
    }
}
