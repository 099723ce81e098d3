use std::io::{self, Write};

use crate::{
    types::{BindingOperation, Message, PartReference},
    Wsdl,
};

fn signature(message: Option<&Message>) -> String {
    let parts = message.map(|message| {
        message
            .parts
            .values()
            .map(|part| match &part.reference {
                PartReference::Element(name) | PartReference::Type(name) => {
                    format!("{}: {}", part.name, name)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    });

    parts.unwrap_or_default()
}

fn operation(operation: &BindingOperation) -> String {
    let messages = operation
        .operation()
        .and_then(|operation| operation.messages());

    let input = signature(messages.and_then(|messages| messages.input.as_deref()));
    let output = signature(messages.and_then(|messages| messages.output.as_deref()));

    format!("{}({}) -> {}", operation.name, input, output)
}

impl Wsdl {
    /// Writes a readable summary of the resolved model.
    pub fn dump<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let indent = |depth: usize| " ".repeat(depth * 4);

        if let Some(schema) = &self.schema {
            for (title, mut names) in [
                (
                    "Elements:",
                    schema.elements().map(|ty| ty.name.to_string()).collect::<Vec<_>>(),
                ),
                (
                    "Types:",
                    schema.types().map(|ty| ty.name.to_string()).collect::<Vec<_>>(),
                ),
            ] {
                names.sort();
                writeln!(out, "{}", title)?;
                for name in names {
                    writeln!(out, "{}{}", indent(1), name)?;
                }
                writeln!(out)?;
            }
        }

        for service in self.services.values() {
            writeln!(out, "Service: {}", service.name)?;

            for port in service.ports.values() {
                let location = port.location.as_deref().unwrap_or("-");
                writeln!(
                    out,
                    "{}Port: {} (binding: {}, location: {})",
                    indent(1),
                    port.name,
                    port.binding_name,
                    location
                )?;

                match port.binding() {
                    Some(binding) => {
                        writeln!(out, "{}Operations:", indent(2))?;
                        for binding_operation in binding.operations.values() {
                            writeln!(out, "{}{}", indent(3), operation(binding_operation))?;
                        }
                    }

                    None => writeln!(out, "{}Unsupported binding", indent(2))?,
                }

                writeln!(out)?;
            }
        }

        Ok(())
    }
}
