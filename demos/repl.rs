use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tailwalk::ast::Value;
use tailwalk::evaluator::{self, Environment};
use tracing_subscriber::EnvFilter;

const HISTORY_FILE: &str = ".tailwalk_history";

fn main() -> rustyline::Result<()> {
    // RUST_LOG=tailwalk=debug shows definitions and tail calls
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    println!("tailwalk: a small Lisp with proper tail calls");
    println!("Enter expressions like: (def! inc (fn* (x) (+ x 1)))");
    println!("Type :help for more commands, or Ctrl+C to exit.");
    println!();

    let mut rl = DefaultEditor::new()?;
    // A missing history file just means a first run
    _ = rl.load_history(HISTORY_FILE);

    let env = evaluator::create_global_env();

    // Callable from user code too: (help)
    env.register_native_operation("help", print_help);

    loop {
        match rl.readline("user> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":env" => {
                        print_environment(&env);
                        continue;
                    }
                    ":quit" | ":exit" => {
                        println!("Goodbye!");
                        break;
                    }
                    _ => {}
                }

                match tailwalk::rep(line, &env) {
                    Ok(output) if output.is_empty() => {}
                    Ok(output) => println!("{output}"),
                    Err(e) => println!("Error: {e}"),
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                println!("Error: {err:?}");
                break;
            }
        }
    }

    _ = rl.save_history(HISTORY_FILE);
    Ok(())
}

fn print_help() -> Value {
    println!("Commands:");
    println!("  :help      - Show this help message");
    println!("  :env       - Show current environment bindings");
    println!("  :quit      - Exit the interpreter");
    println!("  :exit      - Exit the interpreter");
    println!("  Ctrl+C     - Exit the interpreter");
    println!();
    println!("Special forms:");
    println!("  (def! name expr)            bind in the current scope");
    println!("  (let* (a 1 b (+ a 1)) body) sequential local bindings");
    println!("  (do expr ... last)          evaluate in order, yield last");
    println!("  (if cond then else)         else is optional");
    println!("  (fn* (a & rest) body)       closure, also spelled λ");
    println!();
    println!("Builtins: + - * / = < > <= >= list list? empty? count not");
    println!();
    println!("Examples:");
    println!("  (def! sum (fn* (n acc) (if (= n 0) acc (sum (- n 1) (+ n acc)))))");
    println!("  (sum 100000 0)");
    println!("  {{:total (+ 1 2) :items [1 2 3]}}");
    println!();

    Value::Nil
}

fn print_environment(env: &Environment) {
    let bindings = env.get_all_bindings();

    // Separate builtins from user definitions
    let mut natives = Vec::new();
    let mut user_defined = Vec::new();
    for (name, value) in bindings {
        match value {
            Value::NativeFunction { .. } => natives.push(name),
            _ => user_defined.push((name, value)),
        }
    }

    if !natives.is_empty() {
        println!("Native functions ({}):", natives.len());
        for row in natives.chunks(6) {
            let line: String = row.iter().map(|name| format!("  {name:<10}")).collect();
            println!("{}", line.trim_end());
        }
        println!();
    }

    if user_defined.is_empty() {
        println!("No user definitions yet.");
    } else {
        println!("User definitions ({}):", user_defined.len());
        for (name, value) in user_defined {
            println!("  {name} = {value}");
        }
    }
}
