// SPDX-License-Identifier: MIT OR Apache-2.0

//! Doctype fixtures shared by the tests of all crates.
use crate::provider::MemoryMetaProvider;
use crate::schema::{Autoname, DocTypeMeta, FieldDef, FieldType, PermRule, PermType, WorkflowDef};
use crate::DocStatus;

pub const STOCK_USER: &str = "Stock User";
pub const STOCK_MANAGER: &str = "Stock Manager";
pub const SALES_USER: &str = "Sales User";
pub const SALES_MANAGER: &str = "Sales Manager";
pub const PURCHASE_USER: &str = "Purchase User";
pub const PURCHASE_MANAGER: &str = "Purchase Manager";

pub fn item_group() -> DocTypeMeta {
    DocTypeMeta::new("Item Group")
        .with_autoname(Autoname::Field("item_group_name".into()))
        .with_field(FieldDef::new("item_group_name", FieldType::Data).reqd())
        .with_permission(PermRule::full(STOCK_USER))
}

pub fn item() -> DocTypeMeta {
    DocTypeMeta::new("Item")
        .with_autoname(Autoname::Field("item_code".into()))
        .with_title_field("item_name")
        .tracked()
        .with_field(
            FieldDef::new("item_code", FieldType::Data)
                .reqd()
                .set_only_once(),
        )
        .with_field(FieldDef::new("item_name", FieldType::Data).in_global_search())
        .with_field(FieldDef::link("item_group", "Item Group").with_default("All Items"))
        .with_field(FieldDef::new("standard_rate", FieldType::Currency).non_negative())
        .with_field(FieldDef::new("valuation_rate", FieldType::Currency).with_permlevel(1))
        .with_field(FieldDef::new("stock_uom", FieldType::Data).read_only())
        .with_field(FieldDef::new("disabled", FieldType::Check).with_default(0))
        .with_permission(PermRule::full(STOCK_USER))
        .with_permission(
            PermRule::new(STOCK_MANAGER)
                .at_level(1)
                .allow(PermType::Read)
                .allow(PermType::Write),
        )
        .with_permission(PermRule::full(STOCK_MANAGER))
        .with_permission(PermRule::new(SALES_USER).allow(PermType::Read))
}

pub fn customer() -> DocTypeMeta {
    DocTypeMeta::new("Customer")
        .with_autoname(Autoname::Field("customer_name".into()))
        .with_field(FieldDef::new("customer_name", FieldType::Data).reqd())
        .with_permission(PermRule::full(SALES_USER))
}

pub fn sales_order() -> DocTypeMeta {
    DocTypeMeta::new("Sales Order")
        .with_autoname(Autoname::Series("SO-.####".into()))
        .submittable()
        .tracked()
        .with_field(FieldDef::link("customer", "Customer").reqd())
        .with_field(FieldDef::new("title", FieldType::Data).in_global_search())
        .with_field(
            FieldDef::new("status", FieldType::Select)
                .with_options("Draft\nTo Deliver\nCompleted")
                .with_default("Draft")
                .allow_on_submit(),
        )
        .with_field(FieldDef::new("delivery_date", FieldType::Date).reqd())
        .with_field(FieldDef::new("discount", FieldType::Percent).with_permlevel(2))
        .with_field(FieldDef::new("remarks", FieldType::SmallText).allow_on_submit())
        .with_field(FieldDef::table("items", "Sales Order Item"))
        .with_field(FieldDef::table("payment_schedule", "Payment Schedule").allow_on_submit())
        .with_field(FieldDef::table("sales_team", "Sales Team").with_permlevel(2))
        .with_field(
            FieldDef::link("amended_from", "Sales Order")
                .no_copy()
                .read_only(),
        )
        .with_permission(PermRule::full(SALES_USER))
        .with_permission(PermRule::full(SALES_MANAGER))
        .with_permission(
            PermRule::new(SALES_MANAGER)
                .at_level(2)
                .allow(PermType::Read)
                .allow(PermType::Write),
        )
}

pub fn sales_order_item() -> DocTypeMeta {
    DocTypeMeta::new("Sales Order Item")
        .child_table()
        .with_field(FieldDef::link("item_code", "Item").reqd())
        .with_field(FieldDef::new("qty", FieldType::Float).reqd().non_negative())
        .with_field(FieldDef::new("rate", FieldType::Currency).non_negative())
        .with_field(FieldDef::new("delivered_qty", FieldType::Float).allow_on_submit())
        .with_field(FieldDef::new("commission_rate", FieldType::Percent).with_permlevel(2))
}

pub fn sales_team() -> DocTypeMeta {
    DocTypeMeta::new("Sales Team")
        .child_table()
        .with_field(FieldDef::new("sales_person", FieldType::Data).reqd())
        .with_field(FieldDef::new("allocated_percentage", FieldType::Percent).non_negative())
}

pub fn payment_schedule() -> DocTypeMeta {
    DocTypeMeta::new("Payment Schedule")
        .child_table()
        .with_field(FieldDef::new("due_date", FieldType::Date).reqd())
        .with_field(
            FieldDef::new("payment_amount", FieldType::Currency)
                .non_negative()
                .allow_on_submit(),
        )
}

/// Submittable document pointing at a sales order through a static link.
pub fn delivery_note() -> DocTypeMeta {
    DocTypeMeta::new("Delivery Note")
        .submittable()
        .with_field(FieldDef::link("against_sales_order", "Sales Order").reqd())
        .with_permission(PermRule::full(SALES_USER))
}

/// Free text note pointing at any other document through a dynamic link.
pub fn note() -> DocTypeMeta {
    DocTypeMeta::new("Note")
        .with_field(FieldDef::new("content", FieldType::Text).in_global_search())
        .with_field(FieldDef::new("reference_doctype", FieldType::Data))
        .with_field(
            FieldDef::new("reference_name", FieldType::DynamicLink)
                .with_options("reference_doctype"),
        )
        .with_permission(PermRule::full(SALES_USER))
        .with_permission(PermRule::full(STOCK_USER))
}

pub fn settings() -> DocTypeMeta {
    DocTypeMeta::new("Settings")
        .single()
        .with_field(FieldDef::new("company_name", FieldType::Data).with_default("ACME"))
        .with_field(FieldDef::new("currency", FieldType::Data))
        .with_permission(PermRule::full(STOCK_MANAGER))
}

pub fn purchase_request() -> DocTypeMeta {
    DocTypeMeta::new("Purchase Request")
        .with_autoname(Autoname::Series("PR-.###".into()))
        .submittable()
        .with_field(FieldDef::new("description", FieldType::Data))
        .with_field(FieldDef::new("workflow_state", FieldType::Data))
        .with_permission(PermRule::full(PURCHASE_USER))
        .with_permission(PermRule::full(PURCHASE_MANAGER))
        .with_workflow(
            WorkflowDef::new("Purchase Approval", "workflow_state")
                .with_state("Draft", DocStatus::Draft)
                .with_state("Pending", DocStatus::Draft)
                .with_state("Approved", DocStatus::Submitted)
                .with_state("Rejected", DocStatus::Cancelled)
                .with_transition("Draft", "Review", "Pending", PURCHASE_USER)
                .with_transition("Pending", "Approve", "Approved", PURCHASE_MANAGER)
                .with_transition("Approved", "Reject", "Rejected", PURCHASE_MANAGER),
        )
}

/// Provider with all fixture doctypes registered.
pub fn fixture_provider() -> MemoryMetaProvider {
    let provider = MemoryMetaProvider::new();
    for meta in [
        item_group(),
        item(),
        customer(),
        sales_order(),
        sales_order_item(),
        payment_schedule(),
        sales_team(),
        delivery_note(),
        note(),
        settings(),
        purchase_request(),
    ] {
        provider.insert(meta);
    }
    provider
}
