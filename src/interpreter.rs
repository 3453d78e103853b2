use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::mem;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::class::LoxClass;
use crate::environment::Environment;
use crate::error::{runtime_error, Error};
use crate::function::Function;
use crate::object::Object;
use crate::syntax::{expr, stmt, Expr, FunctionDecl, LiteralValue, Stmt};
use crate::token::{Token, TokenType};

/// Walks the AST produced by the parser, after the resolver has annotated
/// every local variable/assignment/this/super node with its scope depth.
pub struct Interpreter {
    pub globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    // Node id -> number of environments to hop out before the binding is
    // found. Populated entirely by `Resolver::resolve_local` before a single
    // statement is executed.
    locals: HashMap<u64, usize>,
    // Where `print` statements write. Real stdout outside tests; an
    // in-memory sink for the golden fixture harness.
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    pub fn with_output(output: Box<dyn Write>) -> Self {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define(
            "clock".to_string(),
            Object::Callable(Function::Native {
                name: "clock".to_string(),
                arity: 0,
                func: |_arguments| {
                    let elapsed = SystemTime::now()
                        .duration_since(UNIX_EPOCH)
                        .expect("system clock is before the unix epoch");
                    Object::Number(elapsed.as_secs_f64())
                },
            }),
        );

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Recorded by the resolver once per `Variable`/`Assign`/`This`/`Super`
    /// node; `id` is that node's dense identity, not its lexeme.
    pub fn resolve(&mut self, id: u64, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Runs a whole script/REPL chunk, stopping and reporting at the first
    /// runtime error. A static (parse/resolve) error never reaches here.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        log::debug!("interpreting {} top-level statements", statements.len());
        for statement in statements {
            if let Err(err) = self.execute(statement) {
                if let Error::Runtime { token, message } = &err {
                    runtime_error(token, message);
                }
                return Err(err);
            }
        }
        Ok(())
    }

    fn execute(&mut self, statement: &Stmt) -> Result<(), Error> {
        statement.accept(self)
    }

    /// Swaps in `environment` for the duration of `statements`, restoring the
    /// previous one on every exit path — including a propagated `Err`, which
    /// is how both runtime errors and `return` unwind through nested blocks.
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Error> {
        let previous = mem::replace(&mut self.environment, environment);
        let result = statements.iter().try_for_each(|s| self.execute(s));
        self.environment = previous;
        result
    }

    fn evaluate(&mut self, expression: &Expr) -> Result<Object, Error> {
        expression.accept(self)
    }

    fn look_up_variable(&mut self, name: &Token, id: u64) -> Result<Object, Error> {
        if let Some(distance) = self.locals.get(&id) {
            Ok(Environment::get_at(&self.environment, *distance, &name.lexeme))
        } else {
            self.globals.borrow().get(name)
        }
    }
}

fn number_operand_error<R>(operator: &Token) -> Result<R, Error> {
    Err(Error::Runtime {
        token: operator.clone(),
        message: "Operand must be a number.".to_string(),
    })
}

fn number_operands_error<R>(operator: &Token) -> Result<R, Error> {
    Err(Error::Runtime {
        token: operator.clone(),
        message: "Operands must be numbers.".to_string(),
    })
}

impl expr::Visitor<Object> for Interpreter {
    fn visit_literal_expr(&mut self, value: &LiteralValue) -> Result<Object, Error> {
        Ok(match value {
            LiteralValue::Boolean(b) => Object::Boolean(*b),
            LiteralValue::Null => Object::Null,
            LiteralValue::Number(n) => Object::Number(*n),
            LiteralValue::String(s) => Object::String(s.clone()),
        })
    }

    fn visit_grouping_expr(&mut self, expression: &Expr) -> Result<Object, Error> {
        self.evaluate(expression)
    }

    fn visit_unary_expr(&mut self, operator: &Token, right: &Expr) -> Result<Object, Error> {
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => match right {
                Object::Number(n) => Ok(Object::Number(-n)),
                _ => number_operand_error(operator),
            },
            TokenType::Bang => Ok(Object::Boolean(!right.is_truthy())),
            _ => unreachable!("parser never produces a unary op other than '-' or '!'"),
        }
    }

    // Division by zero is not a runtime error here: `f64` division follows
    // IEEE 754 and simply produces `inf`/`-inf`/`NaN`, same as jlox's `double`.
    fn visit_binary_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Object, Error> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;

        match operator.token_type {
            TokenType::Minus => match (left, right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Number(l - r)),
                _ => number_operands_error(operator),
            },
            TokenType::Slash => match (left, right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Number(l / r)),
                _ => number_operands_error(operator),
            },
            TokenType::Star => match (left, right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Number(l * r)),
                _ => number_operands_error(operator),
            },
            TokenType::Plus => match (left, right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Number(l + r)),
                (Object::String(l), Object::String(r)) => Ok(Object::String(l + &r)),
                _ => Err(Error::Runtime {
                    token: operator.clone(),
                    message: "Operands must be two numbers or two strings.".to_string(),
                }),
            },
            TokenType::GreaterEqual => match (left, right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Boolean(l >= r)),
                _ => number_operands_error(operator),
            },
            TokenType::Greater => match (left, right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Boolean(l > r)),
                _ => number_operands_error(operator),
            },
            TokenType::LessEqual => match (left, right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Boolean(l <= r)),
                _ => number_operands_error(operator),
            },
            TokenType::Less => match (left, right) {
                (Object::Number(l), Object::Number(r)) => Ok(Object::Boolean(l < r)),
                _ => number_operands_error(operator),
            },
            TokenType::BangEqual => Ok(Object::Boolean(!left.equals(&right))),
            TokenType::EqualEqual => Ok(Object::Boolean(left.equals(&right))),
            _ => unreachable!("parser never produces a binary op outside this set"),
        }
    }

    fn visit_variable_expr(&mut self, id: u64, name: &Token) -> Result<Object, Error> {
        self.look_up_variable(name, id)
    }

    fn visit_assign_expr(&mut self, id: u64, name: &Token, value: &Expr) -> Result<Object, Error> {
        let value = self.evaluate(value)?;

        if let Some(distance) = self.locals.get(&id) {
            Environment::assign_at(&self.environment, *distance, name, value.clone());
        } else {
            self.globals.borrow_mut().assign(name, value.clone())?;
        }

        Ok(value)
    }

    fn visit_logical_expr(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Object, Error> {
        let left = self.evaluate(left)?;

        // Short-circuit: `or` returns its left operand if truthy, `and`
        // returns it if falsey, without ever evaluating the right operand.
        if operator.token_type == TokenType::Or {
            if left.is_truthy() {
                return Ok(left);
            }
        } else if !left.is_truthy() {
            return Ok(left);
        }

        self.evaluate(right)
    }

    fn visit_call_expr(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> Result<Object, Error> {
        let callee = self.evaluate(callee)?;

        let mut args = Vec::with_capacity(arguments.len());
        for argument in arguments {
            args.push(self.evaluate(argument)?);
        }

        let arity = match &callee {
            Object::Callable(function) => function.arity(),
            Object::Class(class) => class.borrow().arity(),
            _ => {
                return Err(Error::Runtime {
                    token: paren.clone(),
                    message: "Can only call functions and classes.".to_string(),
                })
            }
        };

        if args.len() != arity {
            return Err(Error::Runtime {
                token: paren.clone(),
                message: format!("Expected {} arguments but got {}.", arity, args.len()),
            });
        }

        match callee {
            Object::Callable(function) => function.call(self, &args),
            Object::Class(class) => LoxClass::call(&class, self, &args),
            _ => unreachable!("already rejected above"),
        }
    }

    fn visit_get_expr(&mut self, object: &Expr, name: &Token) -> Result<Object, Error> {
        let object = self.evaluate(object)?;
        if let Object::Instance(instance) = &object {
            instance.borrow().get(name, &object)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: "Only instances have properties.".to_string(),
            })
        }
    }

    fn visit_set_expr(&mut self, object: &Expr, name: &Token, value: &Expr) -> Result<Object, Error> {
        let object = self.evaluate(object)?;
        if let Object::Instance(instance) = object {
            let value = self.evaluate(value)?;
            instance.borrow_mut().set(name, value.clone());
            Ok(value)
        } else {
            Err(Error::Runtime {
                token: name.clone(),
                message: "Only instances have fields.".to_string(),
            })
        }
    }

    fn visit_super_expr(&mut self, id: u64, keyword: &Token, method: &Token) -> Result<Object, Error> {
        let distance = *self
            .locals
            .get(&id)
            .expect("resolver always records a depth for 'super'");
        let superclass = Environment::get_at(&self.environment, distance, "super");
        let instance = Environment::get_at(&self.environment, distance - 1, "this");

        let superclass = match superclass {
            Object::Class(class) => class,
            _ => unreachable!("'super' only ever binds to a class"),
        };

        match superclass.borrow().find_method(&method.lexeme) {
            Some(found) => Ok(Object::Callable(found.bind(instance))),
            None => Err(Error::Runtime {
                token: method.clone(),
                message: format!("Undefined property '{}'.", method.lexeme),
            }),
        }
    }

    fn visit_this_expr(&mut self, id: u64, keyword: &Token) -> Result<Object, Error> {
        self.look_up_variable(keyword, id)
    }
}

impl stmt::Visitor<()> for Interpreter {
    fn visit_block_stmt(&mut self, statements: &[Stmt]) -> Result<(), Error> {
        let environment = Rc::new(RefCell::new(Environment::from(&self.environment)));
        self.execute_block(statements, environment)
    }

    fn visit_class_stmt(
        &mut self,
        name: &Token,
        superclass: &Option<Expr>,
        methods: &[Stmt],
    ) -> Result<(), Error> {
        let superclass_class = match superclass {
            Some(expr) => {
                let value = self.evaluate(expr)?;
                match value {
                    Object::Class(class) => Some(class),
                    _ => {
                        let token = match expr {
                            Expr::Variable { name, .. } => name,
                            _ => unreachable!("the parser only ever emits a Variable here"),
                        };
                        return Err(Error::Runtime {
                            token: token.clone(),
                            message: "Superclass must be a class.".to_string(),
                        });
                    }
                }
            }
            None => None,
        };

        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), Object::Null);

        let previous = superclass_class.as_ref().map(|class| {
            let env = Rc::new(RefCell::new(Environment::from(&self.environment)));
            env.borrow_mut()
                .define("super".to_string(), Object::Class(Rc::clone(class)));
            mem::replace(&mut self.environment, env)
        });

        let mut method_table = HashMap::new();
        for method in methods {
            let declaration = match method {
                Stmt::Function { declaration } => declaration,
                _ => unreachable!("class bodies only ever contain Stmt::Function"),
            };
            let is_initializer = declaration.name.lexeme == "init";
            let function = Function::User {
                declaration: Rc::clone(declaration),
                closure: Rc::clone(&self.environment),
                is_initializer,
            };
            method_table.insert(declaration.name.lexeme.clone(), function);
        }

        let class = Rc::new(RefCell::new(LoxClass {
            name: name.lexeme.clone(),
            superclass: superclass_class,
            methods: method_table,
        }));

        if let Some(previous) = previous {
            self.environment = previous;
        }

        self.environment
            .borrow_mut()
            .assign(name, Object::Class(class))?;
        Ok(())
    }

    fn visit_expression_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        self.evaluate(expression)?;
        Ok(())
    }

    fn visit_function_stmt(&mut self, declaration: &Rc<FunctionDecl>) -> Result<(), Error> {
        let function = Function::User {
            declaration: Rc::clone(declaration),
            closure: Rc::clone(&self.environment),
            is_initializer: false,
        };
        self.environment
            .borrow_mut()
            .define(declaration.name.lexeme.clone(), Object::Callable(function));
        Ok(())
    }

    fn visit_if_stmt(
        &mut self,
        condition: &Expr,
        then_branch: &Stmt,
        else_branch: &Option<Box<Stmt>>,
    ) -> Result<(), Error> {
        if self.evaluate(condition)?.is_truthy() {
            self.execute(then_branch)
        } else if let Some(else_branch) = else_branch {
            self.execute(else_branch)
        } else {
            Ok(())
        }
    }

    fn visit_print_stmt(&mut self, expression: &Expr) -> Result<(), Error> {
        let value = self.evaluate(expression)?;
        let _ = writeln!(self.output, "{}", value.stringify());
        Ok(())
    }

    fn visit_return_stmt(&mut self, _keyword: &Token, value: &Option<Expr>) -> Result<(), Error> {
        let value = match value {
            Some(expression) => self.evaluate(expression)?,
            None => Object::Null,
        };
        Err(Error::Return { value })
    }

    fn visit_var_stmt(&mut self, name: &Token, initializer: &Option<Expr>) -> Result<(), Error> {
        let value = match initializer {
            Some(expression) => self.evaluate(expression)?,
            None => Object::Null,
        };
        self.environment
            .borrow_mut()
            .define(name.lexeme.clone(), value);
        Ok(())
    }

    fn visit_while_stmt(&mut self, condition: &Expr, body: &Stmt) -> Result<(), Error> {
        while self.evaluate(condition)?.is_truthy() {
            self.execute(body)?;
        }
        Ok(())
    }

    fn visit_null_stmt(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::resolver::Resolver;
    use crate::scanner::Scanner;

    fn run(source: &str) -> Result<(), Error> {
        let mut scanner = Scanner::new(source.to_string());
        let tokens = scanner.scan_tokens().clone();
        let statements = Parser::new(&tokens).parse()?;

        let mut interpreter = Interpreter::new();
        let mut resolver = Resolver::new(&mut interpreter);
        resolver.resolve_stmts(&statements);

        interpreter.interpret(&statements)
    }

    #[test]
    fn arithmetic_and_string_concatenation_evaluate() {
        assert!(run(r#"print 1 + 2 * 3; print "a" + "b";"#).is_ok());
    }

    #[test]
    fn division_by_zero_is_not_a_runtime_error() {
        assert!(run("print 1 / 0;").is_ok());
    }

    #[test]
    fn undefined_variable_is_a_runtime_error() {
        match run("print missing;") {
            Err(Error::Runtime { message, .. }) => {
                assert_eq!(message, "Undefined variable 'missing'.")
            }
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }

    #[test]
    fn closures_capture_their_defining_environment() {
        let source = r#"
            fun makeCounter() {
                var i = 0;
                fun count() {
                    i = i + 1;
                    return i;
                }
                return count;
            }
            var counter = makeCounter();
            print counter();
            print counter();
        "#;
        assert!(run(source).is_ok());
    }

    #[test]
    fn class_instances_support_fields_and_methods() {
        let source = r#"
            class Greeter {
                init(name) {
                    this.name = name;
                }
                greet() {
                    return "hi " + this.name;
                }
            }
            var g = Greeter("lox");
            print g.greet();
        "#;
        assert!(run(source).is_ok());
    }

    #[test]
    fn subclass_methods_can_call_super() {
        let source = r#"
            class A {
                speak() { return "A"; }
            }
            class B < A {
                speak() { return super.speak() + "B"; }
            }
            print B().speak();
        "#;
        assert!(run(source).is_ok());
    }

    #[test]
    fn calling_a_non_callable_is_a_runtime_error() {
        match run("var x = 1; x();") {
            Err(Error::Runtime { message, .. }) => {
                assert_eq!(message, "Can only call functions and classes.")
            }
            other => panic!("expected a runtime error, got {other:?}"),
        }
    }
}
