mod code_lens;
mod goto;
mod navigate;
mod source_header;
