use crate::environment::Environment;
use crate::error::Error;
use crate::interpreter::Interpreter;
use crate::object::Object;
use crate::syntax::FunctionDecl;

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Clone)]
pub enum Function {
    // These are functions that the interpreter exposes to user code but that
    // are implemented in the host language. Sometimes these are called
    // primitives, external functions, or foreign functions. To add a native
    // function, the book uses anonymous class instances that implement the
    // LoxCallable interface; here a plain fn pointer does the same job since
    // none of our natives need to capture state.
    Native {
        name: String,
        arity: usize,
        func: fn(&[Object]) -> Object,
    },

    // LoxFunction in the book.
    User {
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    },
}

impl Function {
    // We pass in the interpreter in case the callable needs it, and the list
    // of already-evaluated argument values. The implementer's job is then to
    // return the value the call expression produces.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: &[Object]) -> Result<Object, Error> {
        match self {
            Function::Native { func, .. } => Ok(func(arguments)),
            Function::User {
                declaration,
                closure,
                is_initializer,
            } => {
                // Each call gets its own environment nested in the closure.
                // Otherwise recursion would break: if there are multiple
                // calls to the same function in flight at once, each needs
                // its own frame even though they're all calls to the same
                // declaration.
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                for (param, argument) in declaration.params.iter().zip(arguments.iter()) {
                    environment
                        .borrow_mut()
                        .define(param.lexeme.clone(), argument.clone());
                }

                let result = interpreter.execute_block(&declaration.body, environment);

                // An initializer always yields the bound instance, on a bare
                // `return;` and on falling off the end alike (spec invariant 5).
                if *is_initializer {
                    return match result {
                        Err(err @ Error::Runtime { .. }) => Err(err),
                        Err(_) => Ok(Environment::get_at(closure, 0, "this")),
                        Ok(()) => Ok(Environment::get_at(closure, 0, "this")),
                    };
                }

                match result {
                    Err(Error::Return { value }) => Ok(value),
                    Err(other) => Err(other),
                    Ok(()) => Ok(Object::Null), // no return statement ran
                }
            }
        }
    }

    // We create a new environment nestled inside the method's original
    // closure. Sort of a closure-within-a-closure. When the method is
    // called, that becomes the parent of the method body's environment. We
    // declare "this" as a variable in that environment and bind it to the
    // given instance, the instance the method is being accessed from.
    pub fn bind(&self, instance: Object) -> Self {
        match self {
            Function::Native { .. } => unreachable!("native functions are never bound"),
            Function::User {
                declaration,
                closure,
                is_initializer,
            } => {
                let environment = Rc::new(RefCell::new(Environment::from(closure)));
                environment
                    .borrow_mut()
                    .define("this".to_string(), instance);
                Function::User {
                    declaration: Rc::clone(declaration),
                    closure: environment,
                    is_initializer: *is_initializer,
                }
            }
        }
    }

    pub fn arity(&self) -> usize {
        match self {
            Function::Native { arity, .. } => *arity,
            Function::User { declaration, .. } => declaration.params.len(),
        }
    }

    /// Identity, not structural, equality — two functions are "the same"
    /// only if they're the same callable object. For a bound method that
    /// means the same bound closure, since `bind` always mints a fresh one.
    pub fn is_same(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Native { name: a, .. }, Function::Native { name: b, .. }) => a == b,
            (Function::User { closure: a, .. }, Function::User { closure: b, .. }) => {
                Rc::ptr_eq(a, b)
            }
            _ => false,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Function::Native { .. } => write!(f, "<native fn>"),
            Function::User { declaration, .. } => write!(f, "<fn {}>", declaration.name.lexeme),
        }
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
