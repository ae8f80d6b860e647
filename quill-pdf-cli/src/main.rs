use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quill_pdf::events::{EventListener, ListenerFlow, ObjectLocation};
use quill_pdf::{dump, load_with_options, DocumentInfo, ParseOptions, PdfObject};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "quillpdf",
    about = "Inspect and rewrite PDF object graphs",
    version,
    author
)]
struct Cli {
    /// Propagate every parse error instead of repairing
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a PDF file: version, object census, root
    Info {
        /// Input PDF file
        input: PathBuf,
    },

    /// List every object in the resolved graph
    Objects {
        /// Input PDF file
        input: PathBuf,

        /// Also count content-stream operators per document
        #[arg(short = 'c', long)]
        content: bool,
    },

    /// Load a PDF and serialize it again (normalizes the cross-reference
    /// table and repairs stream lengths)
    Rewrite {
        /// Input PDF file
        input: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },
}

/// Tallies parse events for the inspection commands.
#[derive(Default)]
struct Census {
    streams: usize,
    operators: usize,
}

impl EventListener for Census {
    fn on_object_parsed(&mut self, object: &PdfObject, _: ObjectLocation) -> ListenerFlow {
        if object.as_stream().is_some() {
            self.streams += 1;
        }
        ListenerFlow::Continue
    }

    fn on_content_operator(&mut self, _: &str, _: &[PdfObject]) -> ListenerFlow {
        self.operators += 1;
        ListenerFlow::Continue
    }
}

fn options(strict: bool) -> ParseOptions {
    if strict {
        ParseOptions::strict()
    } else {
        ParseOptions::lenient()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Info { input } => {
            let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            let mut census = Census::default();
            let document = {
                let mut listeners: [&mut dyn EventListener; 1] = [&mut census];
                load_with_options(file, options(cli.strict), &mut listeners)
                    .with_context(|| format!("parsing {}", input.display()))?
            };

            println!("File:     {}", input.display());
            println!("Version:  PDF {}", document.version());
            println!("Objects:  {} ({} streams)", document.len(), census.streams);
            match document.root() {
                Some(root) => println!("Root:     {root}"),
                None => println!("Root:     (none)"),
            }
            let info = DocumentInfo::from_document(&document);
            if let Some(title) = info.title {
                println!("Title:    {title}");
            }
            if let Some(author) = info.author {
                println!("Author:   {author}");
            }
            if let Some(producer) = info.producer {
                println!("Producer: {producer}");
            }
            if let Some(created) = info.creation_date {
                println!("Created:  {created}");
            }
        }

        Commands::Objects { input, content } => {
            let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            let mut census = Census::default();
            let document = {
                let mut listeners: [&mut dyn EventListener; 1] = [&mut census];
                load_with_options(file, options(cli.strict), &mut listeners)
                    .with_context(|| format!("parsing {}", input.display()))?
            };

            for (id, object) in document.iter_objects() {
                println!("{id}: {}", describe(object));
            }
            if content {
                println!("{} content-stream operators", census.operators);
            }
        }

        Commands::Rewrite { input, output } => {
            let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            let mut listeners: [&mut dyn EventListener; 0] = [];
            let document = load_with_options(file, options(cli.strict), &mut listeners)
                .with_context(|| format!("parsing {}", input.display()))?;
            tracing::debug!(objects = document.len(), "parsed input graph");

            let sink = BufWriter::new(
                File::create(&output).with_context(|| format!("creating {}", output.display()))?,
            );
            dump(sink, &document).with_context(|| format!("writing {}", output.display()))?;

            println!(
                "Rewrote {} objects into {}",
                document.len(),
                output.display()
            );
        }
    }

    Ok(())
}

fn describe(object: &PdfObject) -> String {
    match object {
        PdfObject::Null => "null".to_string(),
        PdfObject::Boolean(b) => format!("boolean {b}"),
        PdfObject::Integer(i) => format!("integer {i}"),
        PdfObject::Real(r) => format!("real {r}"),
        PdfObject::String(s) => format!("string ({} bytes)", s.as_bytes().len()),
        PdfObject::Name(n) => format!("name /{}", n.as_str()),
        PdfObject::Array(a) => format!("array [{} items]", a.len()),
        PdfObject::Dictionary(d) => match d.get_type() {
            Some(kind) => format!("dictionary /{kind}"),
            None => format!("dictionary ({} keys)", d.len()),
        },
        PdfObject::Stream(s) => format!("stream ({} raw bytes)", s.raw_data().len()),
        PdfObject::Reference(id) => format!("reference {id}"),
    }
}
