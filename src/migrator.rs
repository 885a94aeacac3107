use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_customers_table::Migration),
            Box::new(m20240101_000002_create_catalog_tables::Migration),
            Box::new(m20240101_000003_create_cart_tables::Migration),
            Box::new(m20240101_000004_create_order_tables::Migration),
            Box::new(m20240101_000005_create_payments_table::Migration),
            Box::new(m20240101_000006_create_reviews_table::Migration),
            Box::new(m20240101_000007_create_buy_now_sessions_table::Migration),
        ]
    }
}

mod m20240101_000001_create_customers_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_customers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Customers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Customers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Customers::Email)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Customers::PasswordHash).string().not_null())
                        .col(ColumnDef::new(Customers::RemoteCustomerId).string().null())
                        .col(ColumnDef::new(Customers::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Customers::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Customers::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Customers {
        Table,
        Id,
        Email,
        PasswordHash,
        RemoteCustomerId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000002_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Description).text().null())
                        .col(
                            ColumnDef::new(Products::Price)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::AverageRating)
                                .decimal_len(3, 2)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::TotalReviews)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Products::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Products::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(SpecialOffers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SpecialOffers::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SpecialOffers::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(SpecialOffers::DiscountType)
                                .string_len(20)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SpecialOffers::DiscountValue)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SpecialOffers::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(SpecialOffers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_special_offers_product")
                                .from(SpecialOffers::Table, SpecialOffers::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ProductColors::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ProductColors::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ProductColors::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ProductColors::Name).string().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_product_colors_product")
                                .from(ProductColors::Table, ProductColors::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ProductColors::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(SpecialOffers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
        Name,
        Description,
        Price,
        AverageRating,
        TotalReviews,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum SpecialOffers {
        Table,
        Id,
        ProductId,
        DiscountType,
        DiscountValue,
        IsActive,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum ProductColors {
        Table,
        Id,
        ProductId,
        Name,
    }
}

mod m20240101_000003_create_cart_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_cart_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Carts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Carts::Id).uuid().primary_key().not_null())
                        // one live cart per customer
                        .col(
                            ColumnDef::new(Carts::CustomerId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Carts::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Carts::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(CartItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(CartItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(CartItems::CartId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(CartItems::ProductColorId).uuid().null())
                        .col(ColumnDef::new(CartItems::Quantity).integer().not_null())
                        .col(ColumnDef::new(CartItems::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(CartItems::UpdatedAt).timestamp_with_time_zone().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_cart_items_cart")
                                .from(CartItems::Table, CartItems::CartId)
                                .to(Carts::Table, Carts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(CartItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Carts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Carts {
        Table,
        Id,
        CustomerId,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum CartItems {
        Table,
        Id,
        CartId,
        ProductId,
        ProductColorId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000004_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Orders::CustomerId).uuid().not_null())
                        .col(
                            ColumnDef::new(Orders::TotalAmount)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::ShippingAddress).text().null())
                        .col(ColumnDef::new(Orders::Status).string_len(20).not_null())
                        .col(ColumnDef::new(Orders::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Orders::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_orders_customer")
                        .table(Orders::Table)
                        .col(Orders::CustomerId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(OrderItems::UnitPrice)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderItems::CreatedAt).timestamp_with_time_zone().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_order_items_order")
                                .from(OrderItems::Table, OrderItems::OrderId)
                                .to(Orders::Table, Orders::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OrderItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Orders {
        Table,
        Id,
        CustomerId,
        TotalAmount,
        ShippingAddress,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum OrderItems {
        Table,
        Id,
        OrderId,
        ProductId,
        Quantity,
        UnitPrice,
        CreatedAt,
    }
}

mod m20240101_000005_create_payments_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_payments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Payments::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Payments::Id).uuid().primary_key().not_null())
                        // one payment shadow record per order
                        .col(
                            ColumnDef::new(Payments::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Payments::Amount)
                                .decimal_len(16, 2)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::Status).string_len(20).not_null())
                        .col(
                            ColumnDef::new(Payments::PaymentMethod)
                                .string_len(40)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Payments::ProviderPaymentId).string().null())
                        .col(ColumnDef::new(Payments::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Payments::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Payments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Payments {
        Table,
        Id,
        OrderId,
        Amount,
        Status,
        PaymentMethod,
        ProviderPaymentId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240101_000006_create_reviews_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_reviews_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Reviews::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Reviews::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Reviews::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Reviews::CustomerId).uuid().not_null())
                        .col(ColumnDef::new(Reviews::Rating).small_integer().not_null())
                        .col(ColumnDef::new(Reviews::Comment).text().null())
                        .col(ColumnDef::new(Reviews::CreatedAt).timestamp_with_time_zone().not_null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_reviews_product")
                                .from(Reviews::Table, Reviews::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Reviews::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Reviews {
        Table,
        Id,
        ProductId,
        CustomerId,
        Rating,
        Comment,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
    }
}

mod m20240101_000007_create_buy_now_sessions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000007_create_buy_now_sessions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(BuyNowSessions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(BuyNowSessions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        // one live session per customer
                        .col(
                            ColumnDef::new(BuyNowSessions::CustomerId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(BuyNowSessions::ProductId).uuid().not_null())
                        .col(
                            ColumnDef::new(BuyNowSessions::ProductColorId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BuyNowSessions::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BuyNowSessions::ExpiresAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BuyNowSessions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(BuyNowSessions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_buy_now_sessions_product")
                                .from(BuyNowSessions::Table, BuyNowSessions::ProductId)
                                .to(Products::Table, Products::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_buy_now_sessions_color")
                                .from(BuyNowSessions::Table, BuyNowSessions::ProductColorId)
                                .to(ProductColors::Table, ProductColors::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(BuyNowSessions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum BuyNowSessions {
        Table,
        Id,
        CustomerId,
        ProductId,
        ProductColorId,
        Quantity,
        ExpiresAt,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Products {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum ProductColors {
        Table,
        Id,
    }
}
