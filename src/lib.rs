#![warn(
    rust_2018_idioms,
    missing_debug_implementations,
    unused_extern_crates,
    warnings
)]
//! Geração e validação da Escrituração Fiscal Digital (EFD ICMS/IPI).
//!
//! O encoder recebe coleções já materializadas (empresa, participantes,
//! produtos, documentos fiscais e opcionalmente inventário), monta os
//! registros na ordem de blocos exigida pelo layout (0 → C → D → H → 9) e
//! serializa o arquivo delimitado por pipes. O validador refaz o caminho
//! inverso conferindo os totalizadores do bloco 9.

pub mod data;
pub mod folha;
pub mod parsers;
pub mod reports;
pub mod utils;

pub use data::{
    DocumentoFiscal, EfdInput, Inventario, ItemDocumento, ItemInventario, Participante, Periodo,
    Produto, RelatorioValidacao, SpedConfig, SpedResult, TipoOperacao, Unidade,
    listar_periodos_disponiveis,
};
pub use parsers::efd::validar;
pub use reports::efd_icms_ipi::gerar;
