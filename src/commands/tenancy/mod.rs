pub mod create_company_command;
pub mod create_product_command;
pub mod create_warehouse_command;
pub mod update_product_command;

pub use create_company_command::CreateCompanyCommand;
pub use create_product_command::CreateProductCommand;
pub use create_warehouse_command::CreateWarehouseCommand;
pub use update_product_command::UpdateProductCommand;
